//! Content-addressed tile store.
//!
//! Tiles are metadata rows in SQLite plus one payload file each. Ingest
//! validates the whole batch before anything is written, then writes
//! payload files (outside the database lock) and upserts the metadata in a
//! single transaction.
//!
//! The payload and metadata writes are not one atomic unit. A crash
//! between them leaves an orphaned payload file with no row; a later ingest
//! of the same content simply reuses the path.

pub mod content;
pub mod layout;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::repository::{timestamp, Repository};
use crate::types::{GridRect, StoredTile, TileFilter, TileIngestRecord, TileMeta, TileUsage};

use layout::validate_identifier;

const SELECT_COLUMNS: &str = "SELECT tile_id, stream, snapshot_id, level, x, y, shape, dtype, \
     parent_tile_id, halo, checksum, size_bytes, created_at, access_count, last_access FROM tiles";

/// Bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

/// What one ingest batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Records in the batch.
    pub records: usize,
    /// Metadata rows inserted or updated.
    pub tiles_written: usize,
    /// Payload files written.
    pub payloads_written: usize,
    /// Records whose metadata was already up to date.
    pub unchanged: usize,
}

/// Tile metadata and payload storage.
#[derive(Debug, Clone)]
pub struct TileStore {
    repo: Arc<Repository>,
}

struct DecodedTile {
    meta: TileMeta,
    bytes: Vec<u8>,
}

impl TileStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Ingest a batch of tiles.
    ///
    /// Returns stored metadata for every record, in input order. The batch
    /// is rejected as a whole if any record names an unknown snapshot,
    /// carries an unusable identifier, or has an undecodable payload.
    pub fn put(&self, records: &[TileIngestRecord]) -> StoreResult<Vec<TileMeta>> {
        self.ingest(records).map(|(stored, _)| stored)
    }

    /// [`TileStore::put`], also reporting what the batch changed.
    pub fn ingest(
        &self,
        records: &[TileIngestRecord],
    ) -> StoreResult<(Vec<TileMeta>, IngestOutcome)> {
        if records.is_empty() {
            return Ok((Vec::new(), IngestOutcome::default()));
        }

        for record in records {
            validate_identifier("stream", &record.stream)?;
            validate_identifier("snapshot id", &record.snapshot_id)?;
        }
        let snapshot_ids: BTreeSet<&str> = records.iter().map(|r| r.snapshot_id.as_str()).collect();
        let missing = self.missing_snapshots(&snapshot_ids)?;
        if !missing.is_empty() {
            return Err(StoreError::UnknownSnapshot {
                snapshot_ids: missing,
            });
        }

        let created_at = timestamp::now();
        let decoded = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| decode_record(index, record, created_at))
            .collect::<StoreResult<Vec<_>>>()?;

        let ids: Vec<&str> = decoded.iter().map(|d| d.meta.tile_id.as_str()).collect();
        let mut existing = self.fetch_existing(&ids)?;

        let mut outcome = IngestOutcome {
            records: records.len(),
            ..Default::default()
        };
        let mut stored = Vec::with_capacity(decoded.len());
        let mut pending = Vec::new();

        for DecodedTile { meta, bytes } in decoded {
            let path = self.payload_path(&meta);
            let current = existing.get(&meta.tile_id).cloned();

            let on_disk = path.exists();
            if current.is_none() || !on_disk {
                if current.is_some() {
                    warn!(tile_id = %meta.tile_id, path = %path.display(), "Payload missing for known tile, rewriting");
                }
                layout::write_atomic(&path, &bytes)?;
                outcome.payloads_written += 1;
            }

            match current {
                Some(current) if current.same_content(&meta) => {
                    outcome.unchanged += 1;
                    stored.push(current);
                }
                Some(current) => {
                    let updated = TileMeta {
                        access_count: current.access_count,
                        last_access: current.last_access,
                        ..meta
                    };
                    existing.insert(updated.tile_id.clone(), updated.clone());
                    pending.push(updated.clone());
                    stored.push(updated);
                }
                None => {
                    existing.insert(meta.tile_id.clone(), meta.clone());
                    pending.push(meta.clone());
                    stored.push(meta);
                }
            }
        }

        if !pending.is_empty() {
            self.upsert(&pending)?;
        }
        outcome.tiles_written = pending.len();

        debug!(
            records = outcome.records,
            tiles_written = outcome.tiles_written,
            payloads_written = outcome.payloads_written,
            unchanged = outcome.unchanged,
            "Ingested tile batch"
        );
        Ok((stored, outcome))
    }

    /// Point lookup. Counts as an access.
    pub fn get(&self, tile_id: &str) -> StoreResult<StoredTile> {
        let sql = format!("{} WHERE tile_id = ?1", SELECT_COLUMNS);
        let (stored, ()) = self.lookup(
            &sql,
            vec![tile_id.to_string().into()],
            || StoreError::TileNotFound(tile_id.to_string()),
            ensure_payload,
        )?;
        Ok(stored)
    }

    /// Point lookup returning the payload bytes.
    pub fn read(&self, tile_id: &str) -> StoreResult<(TileMeta, Vec<u8>)> {
        let sql = format!("{} WHERE tile_id = ?1", SELECT_COLUMNS);
        let (stored, bytes) = self.lookup(
            &sql,
            vec![tile_id.to_string().into()],
            || StoreError::TileNotFound(tile_id.to_string()),
            read_payload,
        )?;
        Ok((stored.metadata, bytes))
    }

    /// Newest tile stored at a coordinate. Counts as an access.
    pub fn get_by_coordinate(
        &self,
        stream: &str,
        snapshot_id: &str,
        level: u32,
        x: u32,
        y: u32,
    ) -> StoreResult<StoredTile> {
        let (stored, ()) =
            self.lookup_coordinate(stream, snapshot_id, level, x, y, ensure_payload)?;
        Ok(stored)
    }

    pub fn read_by_coordinate(
        &self,
        stream: &str,
        snapshot_id: &str,
        level: u32,
        x: u32,
        y: u32,
    ) -> StoreResult<(TileMeta, Vec<u8>)> {
        let (stored, bytes) =
            self.lookup_coordinate(stream, snapshot_id, level, x, y, read_payload)?;
        Ok((stored.metadata, bytes))
    }

    fn lookup_coordinate<P>(
        &self,
        stream: &str,
        snapshot_id: &str,
        level: u32,
        x: u32,
        y: u32,
        load: impl FnOnce(&str, &Path) -> StoreResult<P>,
    ) -> StoreResult<(StoredTile, P)> {
        let sql = format!(
            "{} WHERE stream = ?1 AND snapshot_id = ?2 AND level = ?3 AND x = ?4 AND y = ?5 \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let values: Vec<Value> = vec![
            stream.to_string().into(),
            snapshot_id.to_string().into(),
            i64::from(level).into(),
            i64::from(x).into(),
            i64::from(y).into(),
        ];
        let not_found = || StoreError::TileNotFoundAt {
            stream: stream.to_string(),
            snapshot_id: snapshot_id.to_string(),
            level,
            x,
            y,
        };
        self.lookup(&sql, values, not_found, load)
    }

    /// Range query over one snapshot.
    ///
    /// Ordered by level ascending, then newest first, then tile id. Does
    /// not count as an access.
    pub fn list_for_snapshot(
        &self,
        snapshot_id: &str,
        filter: &TileFilter,
    ) -> StoreResult<Vec<TileMeta>> {
        let mut sql = format!("{} WHERE snapshot_id = ?", SELECT_COLUMNS);
        let mut values: Vec<Value> = vec![snapshot_id.to_string().into()];

        if let Some(stream) = &filter.stream {
            sql.push_str(" AND stream = ?");
            values.push(stream.clone().into());
        }
        if let Some(range) = filter.level_range {
            sql.push_str(" AND level BETWEEN ? AND ?");
            values.push(i64::from(range.min).into());
            values.push(i64::from(range.max).into());
        }
        if let Some(boxes) = filter.bboxes.as_deref().filter(|b| !b.is_empty()) {
            let mut rects: Vec<GridRect> = Vec::new();
            for rect in boxes.iter().filter_map(|b| b.normalize()) {
                if !rects.contains(&rect) {
                    rects.push(rect);
                }
            }
            if rects.is_empty() {
                return Ok(Vec::new());
            }
            let clause = vec!["(x BETWEEN ? AND ? AND y BETWEEN ? AND ?)"; rects.len()].join(" OR ");
            sql.push_str(&format!(" AND ({})", clause));
            for rect in &rects {
                values.extend([rect.x_min, rect.x_max, rect.y_min, rect.y_max].map(Value::from));
            }
        }
        sql.push_str(" ORDER BY level ASC, created_at DESC, tile_id ASC");

        let rows = self.repo.with_conn(|conn| query_rows(conn, &sql, values))?;
        let tiles = rows
            .into_iter()
            .map(RawTile::decode)
            .filter(|meta| match meta {
                Ok(meta) => filter.matches_boxes(meta.x, meta.y),
                Err(_) => true,
            })
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(snapshot_id, count = tiles.len(), "Listed tiles");
        Ok(tiles)
    }

    /// Access counters for every tile in a snapshot, keyed by tile id.
    pub fn usage_for_snapshot(&self, snapshot_id: &str) -> StoreResult<HashMap<String, TileUsage>> {
        let rows: Vec<(String, i64, Option<String>)> = self.repo.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tile_id, access_count, last_access FROM tiles WHERE snapshot_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![snapshot_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(tile_id, access_count, last_access)| -> StoreResult<_> {
                let usage = TileUsage {
                    access_count: unsigned(access_count),
                    last_access: last_access
                        .map(|raw| timestamp::decode("tiles", &raw))
                        .transpose()?,
                };
                Ok((tile_id, usage))
            })
            .collect()
    }

    /// Tile count and total payload bytes across the store.
    pub fn totals(&self) -> StoreResult<(u64, u64)> {
        self.repo.with_conn(|conn| {
            let (count, bytes): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM tiles",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok((unsigned(count), unsigned(bytes)))
        })
    }

    /// Where a tile's payload lives.
    pub fn payload_path(&self, meta: &TileMeta) -> PathBuf {
        layout::payload_path(
            self.repo.tiles_dir(),
            &meta.stream,
            &meta.snapshot_id,
            meta.level,
            meta.x,
            meta.y,
            &meta.tile_id,
        )
    }

    fn missing_snapshots(&self, snapshot_ids: &BTreeSet<&str>) -> StoreResult<Vec<String>> {
        self.repo.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM snapshots WHERE snapshot_id = ?1")?;
            let mut missing = Vec::new();
            for id in snapshot_ids {
                if !stmt.exists(params![id])? {
                    missing.push(id.to_string());
                }
            }
            Ok(missing)
        })
    }

    fn fetch_existing(&self, ids: &[&str]) -> StoreResult<HashMap<String, TileMeta>> {
        let mut unique: Vec<&str> = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let rows = self.repo.with_conn(|conn| {
            let mut rows = Vec::new();
            for chunk in unique.chunks(LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!("{} WHERE tile_id IN ({})", SELECT_COLUMNS, placeholders);
                let values = chunk.iter().map(|id| Value::from(id.to_string())).collect();
                rows.extend(query_rows(conn, &sql, values)?);
            }
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|raw| raw.decode().map(|meta| (meta.tile_id.clone(), meta)))
            .collect()
    }

    fn upsert(&self, tiles: &[TileMeta]) -> StoreResult<()> {
        let encoded = tiles
            .iter()
            .map(|meta| serde_json::to_string(&meta.shape))
            .collect::<Result<Vec<_>, _>>()?;

        self.repo.with_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO tiles (
                    tile_id, stream, snapshot_id, level, x, y, shape, dtype,
                    parent_tile_id, halo, checksum, size_bytes, created_at,
                    access_count, last_access
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(tile_id) DO UPDATE SET
                    stream = excluded.stream,
                    snapshot_id = excluded.snapshot_id,
                    level = excluded.level,
                    x = excluded.x,
                    y = excluded.y,
                    shape = excluded.shape,
                    dtype = excluded.dtype,
                    parent_tile_id = excluded.parent_tile_id,
                    halo = excluded.halo,
                    checksum = excluded.checksum,
                    size_bytes = excluded.size_bytes,
                    created_at = excluded.created_at",
            )?;
            for (meta, shape) in tiles.iter().zip(&encoded) {
                stmt.execute(params![
                    meta.tile_id,
                    meta.stream,
                    meta.snapshot_id,
                    meta.level,
                    meta.x,
                    meta.y,
                    shape,
                    meta.dtype,
                    meta.parent_tile_id,
                    meta.halo,
                    meta.checksum,
                    signed(meta.size_bytes),
                    timestamp::encode(&meta.created_at),
                    signed(meta.access_count),
                    meta.last_access.as_ref().map(timestamp::encode),
                ])?;
            }
            Ok(())
        })
    }

    /// Find one row, load its payload with `load`, and record the access,
    /// all under one transaction. A failed load records nothing.
    fn lookup<P>(
        &self,
        sql: &str,
        values: Vec<Value>,
        not_found: impl FnOnce() -> StoreError,
        load: impl FnOnce(&str, &Path) -> StoreResult<P>,
    ) -> StoreResult<(StoredTile, P)> {
        let tiles_dir = self.repo.tiles_dir().to_path_buf();
        let accessed_at = timestamp::now();

        let (raw, payload_path, payload) = self.repo.with_transaction(|tx| {
            let raw = tx
                .query_row(sql, params_from_iter(values), RawTile::from_row)
                .optional()?
                .ok_or_else(not_found)?;
            let payload_path = layout::payload_path(
                &tiles_dir,
                &raw.stream,
                &raw.snapshot_id,
                raw.level,
                raw.x,
                raw.y,
                &raw.tile_id,
            );
            let payload = load(&raw.tile_id, &payload_path)?;
            tx.execute(
                "UPDATE tiles SET access_count = access_count + 1, last_access = ?1 WHERE tile_id = ?2",
                params![timestamp::encode(&accessed_at), raw.tile_id],
            )?;
            Ok((raw, payload_path, payload))
        })?;

        let mut metadata = raw.decode()?;
        metadata.access_count += 1;
        metadata.last_access = Some(accessed_at);
        debug!(tile_id = %metadata.tile_id, access_count = metadata.access_count, "Tile accessed");

        Ok((
            StoredTile {
                metadata,
                payload_path,
            },
            payload,
        ))
    }
}

fn ensure_payload(tile_id: &str, path: &Path) -> StoreResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(StoreError::PayloadMissing {
            tile_id: tile_id.to_string(),
            path: path.to_path_buf(),
        })
    }
}

fn read_payload(tile_id: &str, path: &Path) -> StoreResult<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::PayloadMissing {
            tile_id: tile_id.to_string(),
            path: path.to_path_buf(),
        },
        _ => StoreError::io(path, e),
    })
}

fn decode_record(
    index: usize,
    record: &TileIngestRecord,
    created_at: DateTime<Utc>,
) -> StoreResult<DecodedTile> {
    let bytes = record
        .payload
        .decode()
        .map_err(|e| StoreError::InvalidPayload {
            index,
            reason: e.to_string(),
        })?;

    let meta = TileMeta {
        tile_id: content::tile_id(
            &record.stream,
            &record.snapshot_id,
            record.level,
            record.x,
            record.y,
            &bytes,
        ),
        stream: record.stream.clone(),
        snapshot_id: record.snapshot_id.clone(),
        level: record.level,
        x: record.x,
        y: record.y,
        shape: record.shape,
        dtype: record.dtype.clone(),
        parent_tile_id: record.parent_tile_id.clone(),
        halo: record.halo,
        checksum: content::checksum(&bytes),
        size_bytes: bytes.len() as u64,
        created_at,
        access_count: 0,
        last_access: None,
    };
    Ok(DecodedTile { meta, bytes })
}

fn query_rows(conn: &Connection, sql: &str, values: Vec<Value>) -> StoreResult<Vec<RawTile>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), RawTile::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn unsigned(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

struct RawTile {
    tile_id: String,
    stream: String,
    snapshot_id: String,
    level: u32,
    x: u32,
    y: u32,
    shape: String,
    dtype: String,
    parent_tile_id: Option<String>,
    halo: Option<u32>,
    checksum: String,
    size_bytes: i64,
    created_at: String,
    access_count: i64,
    last_access: Option<String>,
}

impl RawTile {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tile_id: row.get(0)?,
            stream: row.get(1)?,
            snapshot_id: row.get(2)?,
            level: row.get(3)?,
            x: row.get(4)?,
            y: row.get(5)?,
            shape: row.get(6)?,
            dtype: row.get(7)?,
            parent_tile_id: row.get(8)?,
            halo: row.get(9)?,
            checksum: row.get(10)?,
            size_bytes: row.get(11)?,
            created_at: row.get(12)?,
            access_count: row.get(13)?,
            last_access: row.get(14)?,
        })
    }

    fn decode(self) -> StoreResult<TileMeta> {
        let shape: [u32; 3] = serde_json::from_str(&self.shape)?;
        Ok(TileMeta {
            shape,
            created_at: timestamp::decode("tiles", &self.created_at)?,
            last_access: self
                .last_access
                .as_deref()
                .map(|raw| timestamp::decode("tiles", raw))
                .transpose()?,
            size_bytes: unsigned(self.size_bytes),
            access_count: unsigned(self.access_count),
            tile_id: self.tile_id,
            stream: self.stream,
            snapshot_id: self.snapshot_id,
            level: self.level,
            x: self.x,
            y: self.y,
            dtype: self.dtype,
            parent_tile_id: self.parent_tile_id,
            halo: self.halo,
            checksum: self.checksum,
        })
    }
}
