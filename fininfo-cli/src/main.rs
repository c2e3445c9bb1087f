//! FinInfo CLI - linked financial institutions in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{demo, finance_info, logs, user};

/// FinInfo - retrieve and sync your linked financial institutions
#[derive(Parser)]
#[command(name = "fi", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve current FI info for a user and advance their sync cursors
    FinanceInfo {
        /// User id
        id: String,
        /// Partition key of the user document (defaults to the id)
        #[arg(long)]
        user_id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage users and their linked institutions
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::FinanceInfo { id, user_id, json } => finance_info::run(&id, user_id, json),
        Commands::User { command } => user::run(command),
        Commands::Demo { command } => demo::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
