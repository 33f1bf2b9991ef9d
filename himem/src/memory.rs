//! The store facade.
//!
//! [`HierarchicalMemory`] opens one repository and hands it to the catalog,
//! the tile store, the hint log and the planner. It is the boundary the CLI
//! (and any other adapter) talks to.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::SnapshotCatalog;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::hints::HintLog;
use crate::planner::QueryPlanner;
use crate::repository::Repository;
use crate::store::TileStore;
use crate::types::{
    LevelRange, LoggedHint, QueryHint, QueryPlan, QueryRequest, Snapshot, SnapshotSpec,
    TileFilter, TileIngestRecord, TileMeta, TileUsage,
};

/// Row counts and payload volume across the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub snapshots: u64,
    pub tiles: u64,
    pub payload_bytes: u64,
    pub hints: u64,
}

/// A hierarchical, content-addressed tile memory.
#[derive(Debug, Clone)]
pub struct HierarchicalMemory {
    repo: Arc<Repository>,
    catalog: SnapshotCatalog,
    tiles: TileStore,
    hints: HintLog,
    planner: QueryPlanner,
}

impl HierarchicalMemory {
    /// Open (or create) a store.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let repo = Arc::new(Repository::open(config)?);
        let catalog = SnapshotCatalog::new(Arc::clone(&repo));
        let tiles = TileStore::new(Arc::clone(&repo));
        let hints = HintLog::new(Arc::clone(&repo));
        let planner = QueryPlanner::new(tiles.clone(), hints.clone(), config.planner);

        info!(root = %config.root.display(), "Tile memory ready");
        Ok(Self {
            repo,
            catalog,
            tiles,
            hints,
            planner,
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    pub fn catalog(&self) -> &SnapshotCatalog {
        &self.catalog
    }

    pub fn tiles(&self) -> &TileStore {
        &self.tiles
    }

    pub fn hints(&self) -> &HintLog {
        &self.hints
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    // Snapshots

    pub fn create_snapshot(&self, spec: SnapshotSpec) -> StoreResult<Snapshot> {
        self.catalog.create(spec)
    }

    pub fn get_snapshot(&self, snapshot_id: &str) -> StoreResult<Snapshot> {
        self.catalog.get(snapshot_id)
    }

    pub fn list_snapshots(&self) -> StoreResult<Vec<Snapshot>> {
        self.catalog.list()
    }

    pub fn list_recent_snapshots(&self, limit: usize) -> StoreResult<Vec<Snapshot>> {
        self.catalog.list_recent(limit)
    }

    pub fn snapshot_exists(&self, snapshot_id: &str) -> StoreResult<bool> {
        self.catalog.exists(snapshot_id)
    }

    // Tiles

    pub fn put_tiles(&self, records: Vec<TileIngestRecord>) -> StoreResult<Vec<TileMeta>> {
        self.tiles.put(&records)
    }

    /// Metadata and payload for one tile. Counts as an access.
    pub fn get_tile(&self, tile_id: &str) -> StoreResult<(TileMeta, Vec<u8>)> {
        self.tiles.read(tile_id)
    }

    /// Newest tile at a coordinate. Counts as an access.
    pub fn get_tile_by_coordinate(
        &self,
        stream: &str,
        snapshot_id: &str,
        level: u32,
        x: u32,
        y: u32,
    ) -> StoreResult<(TileMeta, Vec<u8>)> {
        self.tiles.read_by_coordinate(stream, snapshot_id, level, x, y)
    }

    pub fn tiles_for_snapshot(
        &self,
        snapshot_id: &str,
        filter: &TileFilter,
    ) -> StoreResult<Vec<TileMeta>> {
        self.tiles.list_for_snapshot(snapshot_id, filter)
    }

    pub fn tile_usage_for_snapshot(
        &self,
        snapshot_id: &str,
    ) -> StoreResult<HashMap<String, TileUsage>> {
        self.tiles.usage_for_snapshot(snapshot_id)
    }

    // Hints

    /// Record hints. Unlike [`HintLog::append`], an empty batch is an error.
    pub fn log_hints(&self, hints: Vec<QueryHint>) -> StoreResult<()> {
        if hints.is_empty() {
            return Err(StoreError::EmptyHintBatch);
        }
        self.hints.append(&hints)
    }

    pub fn recent_hints(
        &self,
        snapshot_id: &str,
        stream: Option<&str>,
        level_range: Option<LevelRange>,
        limit: usize,
    ) -> StoreResult<Vec<QueryHint>> {
        self.hints.recent(snapshot_id, stream, level_range, limit)
    }

    pub fn all_hints(&self) -> StoreResult<Vec<LoggedHint>> {
        self.hints.all()
    }

    // Planning

    pub fn plan(&self, request: &QueryRequest) -> StoreResult<QueryPlan> {
        self.planner.plan(request)
    }

    pub fn plan_at(&self, request: &QueryRequest, now: DateTime<Utc>) -> StoreResult<QueryPlan> {
        self.planner.plan_at(request, now)
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let (tiles, payload_bytes) = self.tiles.totals()?;
        Ok(StoreStats {
            snapshots: self.catalog.count()?,
            tiles,
            payload_bytes,
            hints: self.hints.count()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, SnapshotProvenance};
    use tempfile::TempDir;

    fn memory() -> (TempDir, HierarchicalMemory) {
        let temp = TempDir::new().unwrap();
        let memory = HierarchicalMemory::open(&StoreConfig::new(temp.path())).unwrap();
        (temp, memory)
    }

    #[test]
    fn test_empty_hint_batch_rejected() {
        let (_temp, memory) = memory();
        assert!(matches!(
            memory.log_hints(Vec::new()),
            Err(StoreError::EmptyHintBatch)
        ));
    }

    #[test]
    fn test_stats() {
        let (_temp, memory) = memory();
        memory
            .create_snapshot(SnapshotSpec::new("s", SnapshotProvenance::new("m", "c")))
            .unwrap();
        memory
            .put_tiles(vec![TileIngestRecord::new("v", "s", 0, 0, 0, b"1234")])
            .unwrap();
        memory
            .log_hints(vec![QueryHint {
                query_id: "q".into(),
                snapshot_id: "s".into(),
                stream: "v".into(),
                level_range: LevelRange::default(),
                bboxes: vec![BoundingBox::new(0, 0, 1, 1)],
                confidence: 0.5,
            }])
            .unwrap();

        let stats = memory.stats().unwrap();
        assert_eq!(
            stats,
            StoreStats {
                snapshots: 1,
                tiles: 1,
                payload_bytes: 4,
                hints: 1,
            }
        );
        assert_eq!(memory.all_hints().unwrap().len(), 1);
    }

    #[test]
    fn test_isolated_instances() {
        let (_a_dir, a) = memory();
        let (_b_dir, b) = memory();
        a.create_snapshot(SnapshotSpec::new("s", SnapshotProvenance::new("m", "c")))
            .unwrap();
        assert!(a.snapshot_exists("s").unwrap());
        assert!(!b.snapshot_exists("s").unwrap());
    }
}
