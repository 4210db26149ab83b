pub mod commands;

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "leadline",
    about = "Leadline operator CLI",
    long_about = "Inspect Leadline configuration and readiness, apply migrations, and run the \
                  analyzer or the vendor selection engine against JSON on stdin.",
    after_help = "Examples:\n  leadline doctor --json\n  leadline config\n  \
                  leadline select < selection.json\n  leadline analyze < transcript.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Rank a vendor snapshot for a selection request read from stdin",
        long_about = "Reads {\"criteria\": {...}, \"vendors\": [...]} from stdin and prints the \
                      selection result (selected vendors, primary, fallbacks, metrics)."
    )]
    Select,
    #[command(
        about = "Analyze a call transcript read from stdin",
        long_about = "Reads {\"turns\": [...], \"trigger_points\": [...]} (or a bare array of \
                      turns) from stdin and prints the conversation report and trigger scores."
    )]
    Analyze,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Select => with_stdin("select", commands::select::run),
        Command::Analyze => with_stdin("analyze", commands::analyze::run),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn with_stdin(
    command: &str,
    handler: impl FnOnce(&str) -> commands::CommandResult,
) -> commands::CommandResult {
    match read_stdin() {
        Ok(input) => handler(&input),
        Err(error) => commands::CommandResult::failure(command, "input", format!("{error:#}"), 2),
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input).context("failed to read stdin")?;
    Ok(input)
}
