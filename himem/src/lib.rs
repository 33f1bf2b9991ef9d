//! himem - hierarchical, content-addressed tile memory
//!
//! Stores opaque payloads as tiles addressed by `(stream, snapshot, level,
//! x, y)` under named, immutable snapshots, and plans small ranked tile
//! sets for queries using access statistics and prefetch hints.
//!
//! ```ignore
//! use himem::{HierarchicalMemory, StoreConfig, SnapshotSpec, SnapshotProvenance,
//!             TileIngestRecord, QueryRequest};
//!
//! let memory = HierarchicalMemory::open(&StoreConfig::new("/tmp/him"))?;
//! memory.create_snapshot(SnapshotSpec::new("snp_1", SnapshotProvenance::new("model", "abc123")))?;
//! memory.put_tiles(vec![TileIngestRecord::new("kv_cache", "snp_1", 0, 0, 0, b"bytes")])?;
//! let plan = memory.plan(&QueryRequest::new("snp_1", 150))?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod hints;
pub mod logging;
pub mod memory;
pub mod planner;
pub mod repository;
pub mod store;
pub mod types;

pub use catalog::SnapshotCatalog;
pub use config::{ConfigFile, PlannerConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use hints::HintLog;
pub use memory::{HierarchicalMemory, StoreStats};
pub use planner::QueryPlanner;
pub use store::{IngestOutcome, TileStore};
pub use types::{
    BoundingBox, LevelRange, LoggedHint, MergePolicy, QueryHint, QueryPlan, QueryRequest,
    QueryTile, Snapshot, SnapshotProvenance, SnapshotSpec, StoredTile, TileFilter,
    TileIngestRecord, TileMeta, TilePayload, TileUsage,
};
