//! Shared SQLite repository.
//!
//! One connection behind one mutex serializes every metadata read and
//! write. The repository is created once per store and handed to each
//! component as an `Arc`, so independent stores (e.g. one per test) never
//! share state.
//!
//! Payload files are not guarded by this lock; see [`crate::store`].

mod schema;
pub mod timestamp;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Thread-safe handle on the store's database and directory layout.
pub struct Repository {
    conn: Mutex<Connection>,
    root: PathBuf,
    tiles_dir: PathBuf,
}

impl Repository {
    /// Open (or create) the database under `config.root` and apply the schema.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.root).map_err(|e| StoreError::io(&config.root, e))?;
        let db_path = config.db_path();
        info!(path = %db_path.display(), "Opening tile memory database");

        let conn = Connection::open(&db_path)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -i64::from(config.cache_size_kib))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        tracing::debug!(journal_mode = %journal_mode, "SQLite pragmas applied");

        schema::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            root: config.root.clone(),
            tiles_dir: config.tiles_dir(),
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the payload tree.
    pub fn tiles_dir(&self) -> &Path {
        &self.tiles_dir
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction; commit on `Ok`, roll back on `Err`.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
