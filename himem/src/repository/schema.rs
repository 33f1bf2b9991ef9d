//! Database schema.
//!
//! Every statement is idempotent (`IF NOT EXISTS`) so opening an existing
//! store is a no-op. New tables or indexes are appended; existing DDL is
//! never edited.

use rusqlite::Connection;
use tracing::debug;

use crate::error::StoreResult;

pub(crate) fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snapshots (
            snapshot_id TEXT PRIMARY KEY,
            parents TEXT NOT NULL,
            created_at TEXT NOT NULL,
            tags TEXT NOT NULL,
            provenance TEXT NOT NULL,
            merge_policy TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tiles (
            tile_id TEXT PRIMARY KEY,
            stream TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            level INTEGER NOT NULL,
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            shape TEXT NOT NULL,
            dtype TEXT NOT NULL,
            parent_tile_id TEXT,
            halo INTEGER,
            checksum TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            last_access TEXT,
            FOREIGN KEY (snapshot_id) REFERENCES snapshots(snapshot_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_tiles_snapshot_level
            ON tiles(snapshot_id, level);
        CREATE INDEX IF NOT EXISTS idx_tiles_coords
            ON tiles(snapshot_id, stream, level, x, y);

        CREATE TABLE IF NOT EXISTS hints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query_id TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            stream TEXT NOT NULL,
            level_max INTEGER NOT NULL,
            level_min INTEGER NOT NULL,
            bboxes TEXT NOT NULL,
            confidence REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_hints_snapshot
            ON hints(snapshot_id, created_at DESC);
        ",
    )?;
    debug!("Schema up to date");
    Ok(())
}
