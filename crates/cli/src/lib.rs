pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "tenderdesk",
    about = "Tenderdesk operator CLI",
    long_about = "Operate the tender bid-analysis runtime: migrations, demo data, config inspection, readiness checks, and one-off analyses.",
    after_help = "Examples:\n  tenderdesk doctor --json\n  tenderdesk config\n  tenderdesk analyze --file tender.txt"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo cable catalog and sample tenders, then verify them")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, completion provider readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the bid-analysis pipeline on a tender text file and print the result")]
    Analyze {
        #[arg(long, value_name = "PATH", help = "Plain-text tender document to analyse")]
        file: PathBuf,
        #[arg(long, value_name = "ID", help = "Tender id recorded in logs and audit events")]
        tender_id: Option<String>,
    },
}

/// Diagnostics go to stderr so stdout stays a single JSON document.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Analyze { file, tender_id } => commands::analyze::run(&file, tender_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
