//! Demo command - manage demo mode

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_fininfo_dir;
use fininfo_core::services::{DemoService, DEMO_USER_ID};

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off {
        /// Also delete the demo database
        #[arg(long)]
        clean: bool,
    },
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let data_dir = get_fininfo_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    let demo_service = DemoService::new(&data_dir);

    match command {
        Some(DemoCommands::On) => {
            demo_service.enable()?;
            println!("{}", "Demo mode enabled".green());
            println!(
                "A demo user has been created. Run 'fi finance-info {}' to try it.",
                DEMO_USER_ID
            );
            Ok(())
        }
        Some(DemoCommands::Off { clean }) => {
            demo_service.disable(clean)?;
            println!("{}", "Demo mode disabled".yellow());
            Ok(())
        }
        Some(DemoCommands::Status) | None => {
            if demo_service.is_enabled()? {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
            Ok(())
        }
    }
}
