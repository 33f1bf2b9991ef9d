//! Error types for store operations.
//!
//! Every failure the core can report is a variant of [`StoreError`]. Lookup
//! failures are split so callers can tell "never existed"
//! ([`StoreError::is_not_found`]) from "index and data disagree"
//! ([`StoreError::PayloadMissing`]).

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing the tile memory.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A snapshot with this id already exists.
    #[error("Snapshot '{snapshot_id}' already exists")]
    AlreadyExists { snapshot_id: String },

    /// No snapshot with this id.
    #[error("Snapshot '{0}' not found")]
    SnapshotNotFound(String),

    /// No tile with this id.
    #[error("Tile '{0}' not found")]
    TileNotFound(String),

    /// No tile stored at this coordinate.
    #[error("Tile not found for stream={stream} snapshot={snapshot_id} level={level} x={x} y={y}")]
    TileNotFoundAt {
        stream: String,
        snapshot_id: String,
        level: u32,
        x: u32,
        y: u32,
    },

    /// An ingest batch references snapshots that do not exist.
    #[error("Unknown snapshot IDs for tile ingest: {}", snapshot_ids.join(", "))]
    UnknownSnapshot { snapshot_ids: Vec<String> },

    /// Metadata exists but the payload file is gone.
    #[error("Payload for tile '{tile_id}' is missing at {}", path.display())]
    PayloadMissing { tile_id: String, path: PathBuf },

    /// A record's payload could not be decoded.
    #[error("Invalid payload in record {index}: {reason}")]
    InvalidPayload { index: usize, reason: String },

    /// A stream or snapshot id cannot be used as a storage path component.
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A hint failed validation.
    #[error("Invalid hint '{query_id}': {reason}")]
    InvalidHint { query_id: String, reason: String },

    /// A query request failed validation.
    #[error("Invalid query request: {0}")]
    InvalidRequest(String),

    /// A hint batch with no entries.
    #[error("At least one hint is required")]
    EmptyHintBatch,

    /// SQLite failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON column encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure on a specific path.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored row holds a value that cannot be decoded.
    #[error("Corrupt {table} row: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

impl StoreError {
    /// Returns true for the "does not exist" family of lookup failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::SnapshotNotFound(_)
                | StoreError::TileNotFound(_)
                | StoreError::TileNotFoundAt { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
