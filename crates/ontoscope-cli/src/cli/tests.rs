use super::*;
use clap::Parser;
use ontoscope_core::models::FactSeverity;

#[test]
fn evaluate_parses_period_type_and_flags() {
    let cli = Cli::try_parse_from([
        "ontoscope",
        "evaluate",
        "--period",
        "2026-02-09",
        "--type",
        "day",
        "--materialize",
    ])
    .expect("parse");
    match cli.command {
        Commands::Evaluate(args) => {
            assert_eq!(
                args.period,
                chrono::NaiveDate::from_ymd_opt(2026, 2, 9)
            );
            assert_eq!(args.period_type, PeriodType::Day);
            assert!(args.materialize);
            assert!(!args.narrative);
        }
        _ => panic!("expected evaluate command"),
    }
}

#[test]
fn evaluate_defaults_to_current_week() {
    let cli = Cli::try_parse_from(["ontoscope", "evaluate"]).expect("parse");
    assert_eq!(cli.root, PathBuf::from(".ontoscope"));
    match cli.command {
        Commands::Evaluate(args) => {
            assert_eq!(args.period, None);
            assert_eq!(args.period_type, PeriodType::Week);
        }
        _ => panic!("expected evaluate command"),
    }
}

#[test]
fn evaluate_rejects_malformed_period() {
    let parsed = Cli::try_parse_from(["ontoscope", "evaluate", "--period", "2026/02/09"]);
    assert!(parsed.is_err(), "slash dates must be rejected");
    let parsed = Cli::try_parse_from(["ontoscope", "evaluate", "--type", "month"]);
    assert!(parsed.is_err(), "month buckets are not supported");
}

#[test]
fn schema_import_requires_file() {
    let cli = Cli::try_parse_from([
        "ontoscope",
        "--root",
        "/tmp/onto",
        "schema",
        "import",
        "--file",
        "seed.toml",
    ])
    .expect("parse");
    assert_eq!(cli.root, PathBuf::from("/tmp/onto"));
    match cli.command {
        Commands::Schema(SchemaArgs {
            command: SchemaCommand::Import { file },
        }) => assert_eq!(file, PathBuf::from("seed.toml")),
        _ => panic!("expected schema import command"),
    }
    assert!(Cli::try_parse_from(["ontoscope", "schema", "import"]).is_err());
}

#[test]
fn facts_unread_parses_severity_filter() {
    let cli = Cli::try_parse_from([
        "ontoscope",
        "facts",
        "unread",
        "--severity",
        "critical",
        "--limit",
        "5",
    ])
    .expect("parse");
    match cli.command {
        Commands::Facts(FactsArgs {
            command:
                FactsCommand::Unread {
                    severity,
                    limit,
                    offset,
                },
        }) => {
            assert_eq!(severity, Some(FactSeverity::Critical));
            assert_eq!(limit, 5);
            assert_eq!(offset, 0);
        }
        _ => panic!("expected facts unread command"),
    }
    assert!(Cli::try_parse_from(["ontoscope", "facts", "unread", "--severity", "loud"]).is_err());
}

#[test]
fn facts_dismiss_takes_numeric_id() {
    let cli = Cli::try_parse_from(["ontoscope", "facts", "dismiss", "--id", "42"]).expect("parse");
    match cli.command {
        Commands::Facts(FactsArgs {
            command: FactsCommand::Dismiss { id },
        }) => assert_eq!(id, 42),
        _ => panic!("expected facts dismiss command"),
    }
    assert!(Cli::try_parse_from(["ontoscope", "facts", "dismiss", "--id", "abc"]).is_err());
}

#[test]
fn run_parses_interval_and_cycles() {
    let cli = Cli::try_parse_from([
        "ontoscope",
        "run",
        "--interval-secs",
        "60",
        "--max-cycles",
        "2",
    ])
    .expect("parse");
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.interval_secs, 60);
            assert_eq!(args.max_cycles, 2);
            assert_eq!(args.period_type, PeriodType::Week);
        }
        _ => panic!("expected run command"),
    }
    assert!(Cli::try_parse_from(["ontoscope", "run", "--interval-secs", "0"]).is_err());
}
