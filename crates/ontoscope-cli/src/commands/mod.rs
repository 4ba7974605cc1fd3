use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use ontoscope_core::models::FactQuery;
use ontoscope_core::{EvaluateRequest, Ontoscope};

use crate::cli::{Commands, DataCommand, FactsCommand, SchemaCommand};

mod run;
mod signal;
mod support;

use self::run::run_scheduler;
use self::signal::install_interrupt_handler;
use self::support::{print_json, resolve_period};

pub(crate) fn run_from_root(root: &Path, command: Commands) -> Result<()> {
    let app = Ontoscope::open(root)
        .with_context(|| format!("failed to open state under {}", root.display()))?;
    install_interrupt_handler(app.cancel_flag())?;
    run_command(&app, command)
}

fn run_command(app: &Ontoscope, command: Commands) -> Result<()> {
    match command {
        Commands::Evaluate(args) => {
            let request = EvaluateRequest {
                period: resolve_period(args.period, args.period_type),
                materialize: args.materialize,
                narrative: args.narrative,
            };
            let report = app
                .evaluate(request)
                .with_context(|| format!("evaluation of {} failed", request.period))?;
            print_json(&report)?;
        }
        Commands::Schema(args) => match args.command {
            SchemaCommand::Import { file } => {
                let report = app
                    .import_schema_file(&file)
                    .with_context(|| format!("schema import failed: {}", file.display()))?;
                print_json(&report)?;
            }
            SchemaCommand::Show => {
                print_json(&app.schema_summary().context("schema load failed")?)?;
            }
        },
        Commands::Data(args) => match args.command {
            DataCommand::Import { file } => {
                let report = app
                    .import_dataset_file(&file)
                    .with_context(|| format!("dataset import failed: {}", file.display()))?;
                print_json(&report)?;
            }
        },
        Commands::Facts(args) => run_facts(app, args.command)?,
        Commands::Run(args) => {
            let report = run_scheduler(
                app,
                args.period_type,
                args.narrative,
                Duration::from_secs(args.interval_secs),
                args.max_cycles,
            )?;
            print_json(&report)?;
        }
    }
    Ok(())
}

fn run_facts(app: &Ontoscope, command: FactsCommand) -> Result<()> {
    match command {
        FactsCommand::Unread {
            severity,
            limit,
            offset,
        } => {
            let facts = app.unread_facts(&FactQuery {
                severity,
                limit,
                offset,
            })?;
            print_json(&facts)?;
        }
        FactsCommand::Object { id, limit, offset } => {
            print_json(&app.facts_for_object(&id, limit, offset)?)?;
        }
        FactsCommand::Read { id } => {
            app.mark_fact_read(id)
                .with_context(|| format!("failed to mark fact {id} read"))?;
            print_json(&serde_json::json!({"status": "ok", "id": id, "is_read": true}))?;
        }
        FactsCommand::Dismiss { id } => {
            app.dismiss_fact(id)
                .with_context(|| format!("failed to dismiss fact {id}"))?;
            print_json(&serde_json::json!({"status": "ok", "id": id, "is_dismissed": true}))?;
        }
        FactsCommand::Expire => {
            let removed = app.expire_facts(Utc::now())?;
            print_json(&serde_json::json!({"status": "ok", "removed": removed}))?;
        }
        FactsCommand::Count => {
            print_json(&serde_json::json!({"unread": app.count_unread_facts()?}))?;
        }
    }
    Ok(())
}
