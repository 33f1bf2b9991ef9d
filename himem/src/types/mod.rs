//! Value types shared by every component.
//!
//! These are plain data contracts: everything crossing the store boundary
//! is an owned copy of one of these.

mod hint;
mod query;
mod region;
mod snapshot;
mod tile;

pub use hint::{LoggedHint, QueryHint};
pub use query::{
    QueryPlan, QueryRequest, QueryTile, DEFAULT_MAX_TILES, DEFAULT_QUERY_STREAM, MAX_TILES_LIMIT,
};
pub use region::{BoundingBox, GridRect, LevelRange};
pub use snapshot::{MergePolicy, Snapshot, SnapshotProvenance, SnapshotSpec};
pub use tile::{
    StoredTile, TileFilter, TileIngestRecord, TileMeta, TilePayload, TileUsage,
};
