//! CLI command implementations

pub mod demo;
pub mod finance_info;
pub mod logs;
pub mod user;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use fininfo_core::adapters::duckdb::DuckDbUserStore;
use fininfo_core::config::Config;
use fininfo_core::services::{users_db_filename, UserService};
use fininfo_core::{EntryPoint, FinInfoContext, LogEvent, LoggingService};

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<Arc<LoggingService>>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the data directory from environment or default
pub fn get_fininfo_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("FININFO_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".fininfo"))
}

/// Get or create the fininfo context
pub fn get_context() -> Result<FinInfoContext> {
    let data_dir = get_fininfo_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    FinInfoContext::new(&data_dir, EntryPoint::Cli).context("Failed to initialize fininfo context")
}

/// User service without a provider, so user management works before Plaid is configured
pub fn get_user_service() -> Result<(UserService, Option<Arc<LoggingService>>)> {
    let data_dir = get_fininfo_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    let config = Config::load(&data_dir)?;
    let store = DuckDbUserStore::new(&data_dir.join(users_db_filename(config.demo_mode)))?;
    store.ensure_schema()?;

    let logger = LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
        .ok()
        .map(Arc::new);

    Ok((UserService::new(Arc::new(store)), logger))
}
