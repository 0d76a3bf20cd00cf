//! SQLite persistence for conversation sessions
//!
//! This module provides:
//! - The `sessions` / `turns` / `settings` schema and its migrations
//! - Row-level queries used by `SqliteSessionStore` and `RuntimeSettings`
//! - A pooled handle shared by every worker of one orchestrator

mod migrations;
mod queries;

pub use migrations::run_migrations;
pub use queries::*;

use crate::error::{Error, Result, StorageError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Database connection pool type
pub type DbPool = Pool<SqliteConnectionManager>;

const DB_FILE_NAME: &str = "conductor.db";
const FILE_POOL_SIZE: u32 = 10;

/// Applied to every pooled connection. Turns reference their session, and
/// concurrent workers appending to one file wait instead of failing.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Pooled SQLite database holding sessions, turns and runtime settings
pub struct Storage {
    pool: DbPool,
    db_path: PathBuf,
}

impl Storage {
    /// Open (or create) `conductor.db` inside `data_dir`
    pub fn new_with_path(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| {
            Error::Storage(StorageError::Database(format!(
                "Failed to create session data directory {:?}: {}",
                data_dir, e
            )))
        })?;

        Self::from_path(data_dir.join(DB_FILE_NAME))
    }

    /// Open a session database at an explicit file path
    pub fn from_path(db_path: PathBuf) -> Result<Self> {
        info!("Opening session database: {:?}", db_path);
        let manager = SqliteConnectionManager::file(&db_path);
        Self::open(manager, FILE_POOL_SIZE, db_path)
    }

    /// Session database that lives as long as this handle
    pub fn in_memory() -> Result<Self> {
        // Each pooled connection would otherwise see its own empty database.
        Self::open(
            SqliteConnectionManager::memory(),
            1,
            PathBuf::from(":memory:"),
        )
    }

    fn open(manager: SqliteConnectionManager, max_size: u32, db_path: PathBuf) -> Result<Self> {
        let manager = manager.with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| Error::Storage(StorageError::Pool(e.to_string())))?;

        let conn = pool.get()?;
        run_migrations(&conn)?;
        drop(conn);
        debug!("Session schema ready at {:?}", db_path);

        Ok(Self { pool, db_path })
    }

    /// Borrow a pooled connection
    pub fn connection(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| Error::Storage(StorageError::Pool(e.to_string())))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
