use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod facts;
mod parsers;

#[cfg(test)]
mod tests;

pub use facts::{FactsArgs, FactsCommand};
use parsers::{parse_min_one_u64, parse_period_date_arg, parse_period_type_arg};

use ontoscope_core::models::PeriodType;

#[derive(Debug, Parser)]
#[command(name = "ontoscope")]
#[command(about = "Ontology inference over entity observations", version)]
pub struct Cli {
    #[arg(long, default_value = ".ontoscope")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Schema(SchemaArgs),
    Data(DataArgs),
    Facts(FactsArgs),
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// Period start (YYYY-MM-DD); defaults to the current period.
    #[arg(long, value_parser = parse_period_date_arg)]
    pub period: Option<chrono::NaiveDate>,
    #[arg(long = "type", default_value = "week", value_parser = parse_period_type_arg)]
    pub period_type: PeriodType,
    #[arg(long, default_value_t = false)]
    pub materialize: bool,
    #[arg(long, default_value_t = false)]
    pub narrative: bool,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Import a TOML or JSON schema document.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    Show,
}

#[derive(Debug, Args)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommand,
}

#[derive(Debug, Subcommand)]
pub enum DataCommand {
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, default_value_t = 3_600, value_parser = parse_min_one_u64)]
    pub interval_secs: u64,
    /// Zero runs until the process is stopped.
    #[arg(long, default_value_t = 0)]
    pub max_cycles: u32,
    #[arg(long = "type", default_value = "week", value_parser = parse_period_type_arg)]
    pub period_type: PeriodType,
    #[arg(long, default_value_t = false)]
    pub narrative: bool,
}
