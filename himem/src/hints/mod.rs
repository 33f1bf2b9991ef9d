//! Append-only log of prefetch hints.
//!
//! Hints record where future queries against a snapshot are likely to look.
//! The planner reads the most recent window of them to boost matching
//! tiles. Hints reference snapshots loosely: nothing checks that the
//! snapshot exists.

use std::sync::Arc;

use rusqlite::{params, Row};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::repository::{timestamp, Repository};
use crate::types::{BoundingBox, LevelRange, LoggedHint, QueryHint};

const SELECT_COLUMNS: &str = "SELECT id, query_id, snapshot_id, stream, level_max, level_min, \
     bboxes, confidence, created_at FROM hints";

#[derive(Debug, Clone)]
pub struct HintLog {
    repo: Arc<Repository>,
}

impl HintLog {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Record a batch of hints with one timestamp in one transaction.
    ///
    /// An empty batch is a no-op. If any hint is invalid nothing is written.
    pub fn append(&self, hints: &[QueryHint]) -> StoreResult<()> {
        if hints.is_empty() {
            return Ok(());
        }

        let mut encoded = Vec::with_capacity(hints.len());
        for hint in hints {
            hint.validate().map_err(|reason| StoreError::InvalidHint {
                query_id: hint.query_id.clone(),
                reason,
            })?;
            encoded.push(serde_json::to_string(&hint.bboxes)?);
        }

        let created_at = timestamp::encode(&timestamp::now());
        self.repo.with_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO hints (query_id, snapshot_id, stream, level_max, level_min, bboxes, confidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (hint, bboxes) in hints.iter().zip(&encoded) {
                stmt.execute(params![
                    hint.query_id,
                    hint.snapshot_id,
                    hint.stream,
                    hint.level_range.max,
                    hint.level_range.min,
                    bboxes,
                    hint.confidence,
                    created_at,
                ])?;
            }
            Ok(())
        })?;

        debug!(count = hints.len(), "Logged hints");
        Ok(())
    }

    /// Newest hints for a snapshot.
    ///
    /// With a `level_range`, only hints whose own range overlaps it are
    /// returned. Ordered by creation time, then log sequence, both newest
    /// first.
    pub fn recent(
        &self,
        snapshot_id: &str,
        stream: Option<&str>,
        level_range: Option<LevelRange>,
        limit: usize,
    ) -> StoreResult<Vec<QueryHint>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!("{} WHERE snapshot_id = ?", SELECT_COLUMNS);
        let mut values: Vec<rusqlite::types::Value> = vec![snapshot_id.to_string().into()];
        if let Some(stream) = stream {
            sql.push_str(" AND stream = ?");
            values.push(stream.to_string().into());
        }
        if let Some(range) = level_range {
            sql.push_str(" AND level_max >= ? AND level_min <= ?");
            values.push(i64::from(range.min).into());
            values.push(i64::from(range.max).into());
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        values.push(i64::try_from(limit).unwrap_or(i64::MAX).into());

        let logged = self.query(&sql, values)?;
        Ok(logged.into_iter().map(|entry| entry.hint).collect())
    }

    /// Every hint in insertion order.
    pub fn all(&self) -> StoreResult<Vec<LoggedHint>> {
        self.query(&format!("{} ORDER BY id ASC", SELECT_COLUMNS), Vec::new())
    }

    pub fn count(&self) -> StoreResult<u64> {
        self.repo.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM hints", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    fn query(&self, sql: &str, values: Vec<rusqlite::types::Value>) -> StoreResult<Vec<LoggedHint>> {
        let rows = self.repo.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(values), RawHint::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(RawHint::decode).collect()
    }
}

struct RawHint {
    id: i64,
    query_id: String,
    snapshot_id: String,
    stream: String,
    level_max: u32,
    level_min: u32,
    bboxes: String,
    confidence: f64,
    created_at: String,
}

impl RawHint {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            query_id: row.get(1)?,
            snapshot_id: row.get(2)?,
            stream: row.get(3)?,
            level_max: row.get(4)?,
            level_min: row.get(5)?,
            bboxes: row.get(6)?,
            confidence: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn decode(self) -> StoreResult<LoggedHint> {
        let bboxes: Vec<BoundingBox> = serde_json::from_str(&self.bboxes)?;
        Ok(LoggedHint {
            seq: self.id,
            created_at: timestamp::decode("hints", &self.created_at)?,
            hint: QueryHint {
                query_id: self.query_id,
                snapshot_id: self.snapshot_id,
                stream: self.stream,
                level_range: LevelRange::new(self.level_max, self.level_min),
                bboxes,
                confidence: self.confidence,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn log() -> (TempDir, HintLog) {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(Repository::open(&StoreConfig::new(temp.path())).unwrap());
        (temp, HintLog::new(repo))
    }

    fn hint(query_id: &str, stream: &str, range: LevelRange, confidence: f64) -> QueryHint {
        QueryHint {
            query_id: query_id.into(),
            snapshot_id: "snp".into(),
            stream: stream.into(),
            level_range: range,
            bboxes: vec![BoundingBox::new(0, 0, 2, 2)],
            confidence,
        }
    }

    #[test]
    fn test_empty_append_is_noop() {
        let (_temp, log) = log();
        log.append(&[]).unwrap();
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_hint_rejects_whole_batch() {
        let (_temp, log) = log();
        let batch = vec![
            hint("ok", "v", LevelRange::new(2, 0), 0.5),
            hint("bad", "v", LevelRange::new(2, 0), 1.5),
        ];
        let err = log.append(&batch).unwrap_err();
        assert!(matches!(err, StoreError::InvalidHint { ref query_id, .. } if query_id == "bad"));
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_recent_newest_first_within_batch() {
        let (_temp, log) = log();
        log.append(&[
            hint("q1", "v", LevelRange::new(2, 0), 0.5),
            hint("q2", "v", LevelRange::new(2, 0), 0.6),
        ])
        .unwrap();
        let recent = log.recent("snp", None, None, 10).unwrap();
        let ids: Vec<&str> = recent.iter().map(|h| h.query_id.as_str()).collect();
        assert_eq!(ids, vec!["q2", "q1"]);

        let one = log.recent("snp", None, None, 1).unwrap();
        assert_eq!(one[0].query_id, "q2");
    }

    #[test]
    fn test_recent_filters_stream_and_levels() {
        let (_temp, log) = log();
        log.append(&[
            hint("fine", "v", LevelRange::new(1, 0), 0.5),
            hint("coarse", "v", LevelRange::new(5, 4), 0.5),
            hint("other", "kv_cache", LevelRange::new(1, 0), 0.5),
        ])
        .unwrap();

        let hits = log
            .recent("snp", Some("v"), Some(LevelRange::new(2, 0)), 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query_id, "fine");

        assert!(log.recent("missing", None, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_all_in_insertion_order() {
        let (_temp, log) = log();
        log.append(&[hint("a", "v", LevelRange::new(2, 0), 0.1)]).unwrap();
        log.append(&[hint("b", "v", LevelRange::new(2, 0), 0.2)]).unwrap();
        let all = log.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].hint.query_id, "a");
        assert!(all[0].seq < all[1].seq);
        assert_eq!(all[1].hint.bboxes, vec![BoundingBox::new(0, 0, 2, 2)]);
    }
}
