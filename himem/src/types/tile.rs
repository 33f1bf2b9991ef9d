//! Tile value types.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::region::{BoundingBox, LevelRange};

/// Tile payload as it crosses the ingest boundary (base64 text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePayload {
    pub bytes_b64: String,
}

impl TilePayload {
    /// Encode raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes_b64: STANDARD.encode(bytes),
        }
    }

    /// Decode to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.bytes_b64.as_bytes())
    }
}

/// One tile in an ingest batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileIngestRecord {
    pub stream: String,
    pub snapshot_id: String,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub shape: [u32; 3],
    pub dtype: String,
    pub payload: TilePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tile_id: Option<String>,
}

impl TileIngestRecord {
    /// Build a record from raw payload bytes with shape `[1, 1, 1]` and
    /// dtype `application/octet-stream`.
    pub fn new(
        stream: impl Into<String>,
        snapshot_id: impl Into<String>,
        level: u32,
        x: u32,
        y: u32,
        bytes: &[u8],
    ) -> Self {
        Self {
            stream: stream.into(),
            snapshot_id: snapshot_id.into(),
            level,
            x,
            y,
            shape: [1, 1, 1],
            dtype: "application/octet-stream".to_string(),
            payload: TilePayload::from_bytes(bytes),
            halo: None,
            parent_tile_id: None,
        }
    }

    pub fn with_shape(mut self, shape: [u32; 3]) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = dtype.into();
        self
    }

    pub fn with_halo(mut self, halo: u32) -> Self {
        self.halo = Some(halo);
        self
    }

    pub fn with_parent(mut self, parent_tile_id: impl Into<String>) -> Self {
        self.parent_tile_id = Some(parent_tile_id.into());
        self
    }
}

/// Metadata for a stored tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMeta {
    pub tile_id: String,
    pub stream: String,
    pub snapshot_id: String,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub shape: [u32; 3],
    pub dtype: String,
    pub parent_tile_id: Option<String>,
    pub halo: Option<u32>,
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_access: Option<DateTime<Utc>>,
}

impl TileMeta {
    /// Compare everything an ingest can change, ignoring timestamps and
    /// usage counters.
    pub fn same_content(&self, other: &TileMeta) -> bool {
        self.tile_id == other.tile_id
            && self.stream == other.stream
            && self.snapshot_id == other.snapshot_id
            && self.level == other.level
            && self.x == other.x
            && self.y == other.y
            && self.shape == other.shape
            && self.dtype == other.dtype
            && self.parent_tile_id == other.parent_tile_id
            && self.halo == other.halo
            && self.checksum == other.checksum
            && self.size_bytes == other.size_bytes
    }
}

/// Metadata plus the location of the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTile {
    pub metadata: TileMeta,
    pub payload_path: PathBuf,
}

/// Access bookkeeping for one tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileUsage {
    pub access_count: u64,
    pub last_access: Option<DateTime<Utc>>,
}

/// Optional filters for a snapshot range query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileFilter {
    pub stream: Option<String>,
    pub level_range: Option<LevelRange>,
    pub bboxes: Option<Vec<BoundingBox>>,
}

impl TileFilter {
    /// No filtering beyond the snapshot.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    pub fn levels(mut self, range: LevelRange) -> Self {
        self.level_range = Some(range);
        self
    }

    pub fn bboxes(mut self, bboxes: Vec<BoundingBox>) -> Self {
        self.bboxes = Some(bboxes);
        self
    }

    /// Whether a tile's coordinate passes the box filter.
    ///
    /// With no boxes every tile passes; with boxes a tile must fall inside
    /// at least one of them.
    pub fn matches_boxes(&self, x: u32, y: u32) -> bool {
        match &self.bboxes {
            None => true,
            Some(boxes) if boxes.is_empty() => true,
            Some(boxes) => boxes
                .iter()
                .any(|b| b.contains(i64::from(x), i64::from(y))),
        }
    }
}
