//! Demo service - manage demo mode
//!
//! Demo mode answers finance info requests from the deterministic demo
//! provider and keeps its users in a separate demo.duckdb, so it can be
//! tried without Plaid credentials and without touching real user documents.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::adapters::duckdb::DuckDbUserStore;
use crate::config::Config;
use crate::domain::{FiKey, User};
use crate::ports::UserStore;

/// Database file used while demo mode is on
pub const DEMO_DB_FILENAME: &str = "demo.duckdb";

/// Database file used for real users
pub const USERS_DB_FILENAME: &str = "fininfo.duckdb";

/// User seeded into the demo database
pub const DEMO_USER_ID: &str = "demo-user";

/// Demo service for managing demo mode
pub struct DemoService {
    data_dir: PathBuf,
}

impl DemoService {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Check if demo mode is currently enabled
    pub fn is_enabled(&self) -> Result<bool> {
        let config = Config::load(&self.data_dir)?;
        Ok(config.demo_mode)
    }

    /// Enable demo mode
    ///
    /// This will:
    /// 1. Delete any existing demo database (fresh start)
    /// 2. Enable demo mode in config
    /// 3. Create the demo database with a seeded demo user
    pub fn enable(&self) -> Result<()> {
        self.remove_demo_db()?;

        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.enable_demo_mode();
        config.save(&self.data_dir)?;

        let store = DuckDbUserStore::new(&self.data_dir.join(DEMO_DB_FILENAME))?;
        store.ensure_schema()?;
        store.write_user_document(&demo_user().to_document()?)?;

        Ok(())
    }

    /// Disable demo mode
    ///
    /// This will:
    /// 1. Disable demo mode in config
    /// 2. Optionally delete demo database (if clean = true)
    pub fn disable(&self, clean: bool) -> Result<()> {
        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.disable_demo_mode();
        config.save(&self.data_dir)?;

        if clean {
            self.remove_demo_db()?;
        }

        Ok(())
    }

    fn remove_demo_db(&self) -> Result<()> {
        let demo_db = self.data_dir.join(DEMO_DB_FILENAME);
        let demo_wal = self.data_dir.join(format!("{}.wal", DEMO_DB_FILENAME));
        if demo_db.exists() {
            std::fs::remove_file(&demo_db)?;
        }
        if demo_wal.exists() {
            std::fs::remove_file(&demo_wal)?;
        }
        Ok(())
    }
}

/// The demo user: two linked institutions, never synced
pub fn demo_user() -> User {
    let mut user = User::new(DEMO_USER_ID);
    user.fi_keys.push(
        FiKey::new("demo-item-checking", "access-demo-checking").with_institution("ins_demo_chase"),
    );
    user.fi_keys.push(FiKey::new("demo-item-card", "access-demo-card"));
    user
}

/// Database file for the current mode
pub fn users_db_filename(demo_mode: bool) -> &'static str {
    if demo_mode {
        DEMO_DB_FILENAME
    } else {
        USERS_DB_FILENAME
    }
}
