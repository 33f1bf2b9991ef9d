//! Snapshot catalog.
//!
//! Snapshots are named, immutable roots. The catalog is the gatekeeper for
//! tile writes: a tile may only be ingested under a snapshot that exists
//! here. Snapshots are created once and never updated or deleted.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::repository::{timestamp, Repository};
use crate::store::layout::validate_identifier;
use crate::types::{MergePolicy, Snapshot, SnapshotSpec};

const SELECT_COLUMNS: &str =
    "SELECT snapshot_id, parents, created_at, tags, provenance, merge_policy FROM snapshots";

/// Registry of snapshots backed by the shared repository.
#[derive(Debug, Clone)]
pub struct SnapshotCatalog {
    repo: Arc<Repository>,
}

impl SnapshotCatalog {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Store a new snapshot with a server-assigned timestamp.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the id is taken.
    pub fn create(&self, spec: SnapshotSpec) -> StoreResult<Snapshot> {
        validate_identifier("snapshot id", &spec.snapshot_id)?;

        let parents = serde_json::to_string(&spec.parents)?;
        let tags = serde_json::to_string(&spec.tags)?;
        let provenance = serde_json::to_string(&spec.provenance)?;
        let created_at = timestamp::now();

        self.repo.with_transaction(|tx| {
            let taken: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM snapshots WHERE snapshot_id = ?1",
                    params![spec.snapshot_id],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StoreError::AlreadyExists {
                    snapshot_id: spec.snapshot_id.clone(),
                });
            }
            tx.execute(
                "INSERT INTO snapshots (snapshot_id, parents, created_at, tags, provenance, merge_policy)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    spec.snapshot_id,
                    parents,
                    timestamp::encode(&created_at),
                    tags,
                    provenance,
                    spec.merge_policy.as_str(),
                ],
            )?;
            Ok(())
        })?;

        info!(
            snapshot_id = %spec.snapshot_id,
            parents = spec.parents.len(),
            merge_policy = %spec.merge_policy,
            "Created snapshot"
        );

        Ok(Snapshot {
            snapshot_id: spec.snapshot_id,
            parents: spec.parents,
            created_at,
            tags: spec.tags,
            provenance: spec.provenance,
            merge_policy: spec.merge_policy,
        })
    }

    /// Fetch one snapshot.
    pub fn get(&self, snapshot_id: &str) -> StoreResult<Snapshot> {
        let raw = self.repo.with_conn(|conn| {
            let sql = format!("{} WHERE snapshot_id = ?1", SELECT_COLUMNS);
            Ok(conn
                .query_row(&sql, params![snapshot_id], RawSnapshot::from_row)
                .optional()?)
        })?;
        match raw {
            Some(raw) => raw.decode(),
            None => Err(StoreError::SnapshotNotFound(snapshot_id.to_string())),
        }
    }

    /// All snapshots, newest first.
    pub fn list(&self) -> StoreResult<Vec<Snapshot>> {
        self.query_newest_first(None)
    }

    /// The `limit` newest snapshots.
    pub fn list_recent(&self, limit: usize) -> StoreResult<Vec<Snapshot>> {
        self.query_newest_first(Some(limit))
    }

    pub fn exists(&self, snapshot_id: &str) -> StoreResult<bool> {
        self.repo.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM snapshots WHERE snapshot_id = ?1",
                    params![snapshot_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Number of snapshots in the catalog.
    pub fn count(&self) -> StoreResult<u64> {
        self.repo.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    fn query_newest_first(&self, limit: Option<usize>) -> StoreResult<Vec<Snapshot>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = self.repo.with_conn(|conn| {
            let sql = format!(
                "{} ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit], RawSnapshot::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        debug!(count = rows.len(), "Listed snapshots");
        rows.into_iter().map(RawSnapshot::decode).collect()
    }
}

/// Column values before JSON decoding, so decoding happens outside the lock.
struct RawSnapshot {
    snapshot_id: String,
    parents: String,
    created_at: String,
    tags: String,
    provenance: String,
    merge_policy: String,
}

impl RawSnapshot {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            snapshot_id: row.get(0)?,
            parents: row.get(1)?,
            created_at: row.get(2)?,
            tags: row.get(3)?,
            provenance: row.get(4)?,
            merge_policy: row.get(5)?,
        })
    }

    fn decode(self) -> StoreResult<Snapshot> {
        let merge_policy: MergePolicy = self
            .merge_policy
            .parse()
            .map_err(|reason| StoreError::CorruptRow {
                table: "snapshots",
                reason,
            })?;
        Ok(Snapshot {
            parents: serde_json::from_str(&self.parents)?,
            created_at: timestamp::decode("snapshots", &self.created_at)?,
            tags: serde_json::from_str(&self.tags)?,
            provenance: serde_json::from_str(&self.provenance)?,
            merge_policy,
            snapshot_id: self.snapshot_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::types::SnapshotProvenance;
    use tempfile::TempDir;

    fn catalog() -> (TempDir, SnapshotCatalog) {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(Repository::open(&StoreConfig::new(temp.path())).unwrap());
        (temp, SnapshotCatalog::new(repo))
    }

    fn spec(id: &str) -> SnapshotSpec {
        SnapshotSpec::new(id, SnapshotProvenance::new("tiny-diffusion", "abc123"))
    }

    #[test]
    fn test_create_and_get() {
        let (_temp, catalog) = catalog();
        let created = catalog
            .create(
                spec("snp_1")
                    .with_parent("root")
                    .with_tag("task_id", "T1")
                    .with_merge_policy(MergePolicy::Manual),
            )
            .unwrap();

        let fetched = catalog.get("snp_1").unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.parents, vec!["root".to_string()]);
        assert_eq!(fetched.merge_policy, MergePolicy::Manual);
    }

    #[test]
    fn test_duplicate_create_fails() {
        let (_temp, catalog) = catalog();
        catalog.create(spec("snp_1")).unwrap();
        let err = catalog.create(spec("snp_1")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { ref snapshot_id } if snapshot_id == "snp_1"));
        assert_eq!(catalog.count().unwrap(), 1);
    }

    #[test]
    fn test_get_missing() {
        let (_temp, catalog) = catalog();
        let err = catalog.get("nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(!catalog.exists("nope").unwrap());
    }

    #[test]
    fn test_list_newest_first() {
        let (_temp, catalog) = catalog();
        for id in ["a", "b", "c"] {
            catalog.create(spec(id)).unwrap();
        }
        let ids: Vec<String> = catalog
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.snapshot_id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let recent = catalog.list_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].snapshot_id, "c");
    }

    #[test]
    fn test_rejects_path_unsafe_id() {
        let (_temp, catalog) = catalog();
        for bad in ["", "..", "a/b", "a\\b"] {
            let err = catalog.create(spec(bad)).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidIdentifier { .. }),
                "accepted {:?}",
                bad
            );
        }
        assert_eq!(catalog.count().unwrap(), 0);
    }
}
