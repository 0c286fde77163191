pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::{eligibility::EligibilityArgs, CommandResult};

#[derive(Debug, Parser)]
#[command(
    name = "leave",
    about = "Leave assistant operator CLI",
    long_about = "Check readiness, manage the employee directory database, inspect configuration, \
                  and evaluate leave eligibility without the chat layer.",
    after_help = "Examples:\n  leave doctor --json\n  leave seed\n  \
                  leave eligibility --employee E001 --leave-type PTO \
                  --start-date 2026-04-06 --days 2"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo employee directory into the database and verify it")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, language model readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Evaluate one leave request against policy and the employee directory")]
    Eligibility {
        #[arg(long = "employee", help = "Employee id, for example E001")]
        employee_id: String,
        #[arg(long, help = "Leave type, for example PTO or Sick Leave")]
        leave_type: String,
        #[arg(long, help = "First day of leave as YYYY-MM-DD")]
        start_date: String,
        #[arg(long = "days", help = "Number of leave days requested")]
        num_days: u32,
    },
}

pub fn run() -> ExitCode {
    let result = match Cli::parse().command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => CommandResult::rendered(commands::config::run()),
        Command::Doctor { json } => CommandResult::rendered(commands::doctor::run(json)),
        Command::Eligibility { employee_id, leave_type, start_date, num_days } => {
            commands::eligibility::run(&EligibilityArgs {
                employee_id,
                leave_type,
                start_date,
                num_days,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
