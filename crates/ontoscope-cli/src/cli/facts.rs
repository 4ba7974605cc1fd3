use clap::{Args, Subcommand};
use ontoscope_core::models::FactSeverity;

use super::parsers::parse_severity_arg;

#[derive(Debug, Args)]
pub struct FactsArgs {
    #[command(subcommand)]
    pub command: FactsCommand,
}

#[derive(Debug, Subcommand)]
pub enum FactsCommand {
    /// Inbox: facts that are neither read, dismissed nor expired.
    Unread {
        #[arg(long, value_parser = parse_severity_arg)]
        severity: Option<FactSeverity>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    Object {
        #[arg(long)]
        id: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    Read {
        #[arg(long)]
        id: i64,
    },
    Dismiss {
        #[arg(long)]
        id: i64,
    },
    /// Delete facts whose expiry has passed.
    Expire,
    Count,
}
