//! FinInfo Core - retrieve and synchronize a user's linked financial institutions
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (User, FiKey, FinancialInst, etc.)
//! - **ports**: Trait definitions for external dependencies (UserStore, FinancialDataProvider)
//! - **services**: Business logic orchestration (finance info request, cursor reconciliation)
//! - **adapters**: Concrete implementations (DuckDB, Plaid, demo data)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::demo::DemoDataProvider;
use adapters::duckdb::DuckDbUserStore;
use adapters::plaid::PlaidProvider;
use config::Config;
use ports::FinancialDataProvider;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{FiKey, FinancialInst, User};
pub use domain::result::{Error, OperationResult};
pub use services::{
    EntryPoint, FinanceInfoRequest, HttpResponse, LogEntry, LogEvent, LoggingService,
};

/// Main context for FinInfo operations
///
/// This is the primary entry point for all business logic. It holds
/// the user store, configuration, and all services.
pub struct FinInfoContext {
    pub config: Config,
    pub store: Arc<DuckDbUserStore>,
    pub finance_info_service: FinanceInfoService,
    pub user_service: UserService,
    pub logger: Option<Arc<LoggingService>>,
}

impl FinInfoContext {
    /// Create a new context for a data directory
    ///
    /// The provider is chosen from the loaded settings: the demo provider in
    /// demo mode, Plaid otherwise.
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let provider: Arc<dyn FinancialDataProvider> = if config.demo_mode {
            Arc::new(DemoDataProvider::new())
        } else {
            Arc::new(
                PlaidProvider::from_settings(&config.plaid)
                    .context("Failed to configure Plaid provider")?,
            )
        };

        Self::build(data_dir, entry_point, config, provider)
    }

    /// Create a context with an explicit provider
    pub fn with_provider(
        data_dir: &Path,
        entry_point: EntryPoint,
        provider: Arc<dyn FinancialDataProvider>,
    ) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::build(data_dir, entry_point, config, provider)
    }

    fn build(
        data_dir: &Path,
        entry_point: EntryPoint,
        config: Config,
        provider: Arc<dyn FinancialDataProvider>,
    ) -> Result<Self> {
        let db_path = data_dir.join(users_db_filename(config.demo_mode));
        let store = Arc::new(DuckDbUserStore::new(&db_path)?);

        // Initialize schema
        store.ensure_schema()?;

        // Logging should never block operations
        let logger = LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION"))
            .ok()
            .map(Arc::new);

        let mut finance_info_service = FinanceInfoService::new(provider);
        if let Some(logger) = &logger {
            finance_info_service = finance_info_service.with_logger(Arc::clone(logger));
        }
        let user_service = UserService::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            finance_info_service,
            user_service,
            logger,
        })
    }

    /// Run one finance info request against the context's store
    pub fn finance_info(&self, request: &FinanceInfoRequest) -> HttpResponse {
        self.finance_info_service.invoke(request, self.store.as_ref())
    }
}
