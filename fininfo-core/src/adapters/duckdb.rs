//! DuckDB user document store

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use duckdb::{params, Connection};

use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::domain::User;
use crate::ports::UserStore;
use crate::migrations::MIGRATIONS;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Stored document plus bookkeeping columns
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: String,
    pub user_id: String,
    pub document: String,
}

/// DuckDB-backed document store for user records
pub struct DuckDbUserStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbUserStore {
    /// Open (or create) the store at `db_path`
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when several processes open the same data directory.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[fininfo] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// In-memory store, used by tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; JSON is linked in through the Cargo feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;
        Ok(conn)
    }

    fn lock(&self) -> DomainResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DomainError::database(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // === Document operations ===

    /// Raw stored document for `(id, user_id)`
    pub fn get_document(&self, id: &str, user_id: &str) -> DomainResult<Option<StoredUser>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT id, user_id, document FROM sys_user_documents WHERE id = ? AND user_id = ?",
            params![id, user_id],
            |row| {
                Ok(StoredUser {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    document: row.get(2)?,
                })
            },
        );

        match result {
            Ok(stored) => Ok(Some(stored)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create or replace a user document
    pub fn upsert_document(&self, id: &str, user_id: &str, document: &str) -> DomainResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_user_documents (id, user_id, document)
             VALUES (?, ?, ?)
             ON CONFLICT (id, user_id) DO UPDATE SET
                document = EXCLUDED.document,
                updated_at = CURRENT_TIMESTAMP",
            params![id, user_id, document],
        )?;
        Ok(())
    }

    /// All stored users, ordered by id
    pub fn list_users(&self) -> DomainResult<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT document FROM sys_user_documents ORDER BY id")?;
        let documents: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();

        documents
            .iter()
            .map(|doc| User::from_document(doc).map_err(DomainError::from))
            .collect()
    }

    /// Delete a user document, returning whether it existed
    pub fn delete_user(&self, id: &str, user_id: &str) -> DomainResult<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM sys_user_documents WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn user_count(&self) -> DomainResult<i64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sys_user_documents", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl UserStore for DuckDbUserStore {
    fn find_user(&self, id: &str, user_id: &str) -> DomainResult<Option<User>> {
        match self.get_document(id, user_id)? {
            Some(stored) => Ok(Some(User::from_document(&stored.document)?)),
            None => Ok(None),
        }
    }

    fn write_user_document(&self, document: &str) -> DomainResult<()> {
        let user = User::from_document(document)?;
        if user.id.trim().is_empty() {
            return Err(DomainError::validation("user document id cannot be empty"));
        }
        self.upsert_document(&user.id, user.partition_key(), document)
    }
}
