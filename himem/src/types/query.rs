//! Query planner request and response types.

use serde::{Deserialize, Serialize};

use super::region::LevelRange;
use super::tile::TileMeta;

/// Default stream queried when a request does not name one.
pub const DEFAULT_QUERY_STREAM: &str = "kv_cache";

/// Default number of tiles a plan returns.
pub const DEFAULT_MAX_TILES: usize = 8;

/// Upper bound on `max_tiles`.
pub const MAX_TILES_LIMIT: usize = 32;

fn default_stream() -> String {
    DEFAULT_QUERY_STREAM.to_string()
}

fn default_max_tiles() -> usize {
    DEFAULT_MAX_TILES
}

/// A planning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Free-text description of what the caller is after. Not interpreted.
    #[serde(default)]
    pub goal: String,
    pub snapshot_id: String,
    #[serde(default = "default_stream")]
    pub stream: String,
    /// Advisory latency budget, echoed back in the plan.
    pub budget_ms: u64,
    #[serde(default = "default_max_tiles")]
    pub max_tiles: usize,
    #[serde(default)]
    pub level_range: LevelRange,
}

impl QueryRequest {
    /// Request with the default stream, tile count, and level range.
    pub fn new(snapshot_id: impl Into<String>, budget_ms: u64) -> Self {
        Self {
            goal: String::new(),
            snapshot_id: snapshot_id.into(),
            stream: default_stream(),
            budget_ms,
            max_tiles: DEFAULT_MAX_TILES,
            level_range: LevelRange::default(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    pub fn with_max_tiles(mut self, max_tiles: usize) -> Self {
        self.max_tiles = max_tiles;
        self
    }

    pub fn with_level_range(mut self, level_range: LevelRange) -> Self {
        self.level_range = level_range;
        self
    }

    /// Check budget, tile count, and level range.
    pub fn validate(&self) -> Result<(), String> {
        if self.budget_ms == 0 {
            return Err("budget_ms must be greater than 0".to_string());
        }
        if self.max_tiles == 0 || self.max_tiles > MAX_TILES_LIMIT {
            return Err(format!(
                "max_tiles must be within 1..={}, got {}",
                MAX_TILES_LIMIT, self.max_tiles
            ));
        }
        if !self.level_range.is_valid() {
            return Err("level_range must be provided as (max_level, min_level)".to_string());
        }
        Ok(())
    }
}

/// A tile reference in a plan. Carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryTile {
    pub tile_id: String,
    pub stream: String,
    pub snapshot_id: String,
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl From<&TileMeta> for QueryTile {
    fn from(meta: &TileMeta) -> Self {
        Self {
            tile_id: meta.tile_id.clone(),
            stream: meta.stream.clone(),
            snapshot_id: meta.snapshot_id.clone(),
            level: meta.level,
            x: meta.x,
            y: meta.y,
        }
    }
}

/// Ranked planner output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub tiles: Vec<QueryTile>,
    pub acceptance: f64,
    pub budget_ms: u64,
}

impl QueryPlan {
    /// A plan with no tiles and zero acceptance.
    pub fn empty(budget_ms: u64) -> Self {
        Self {
            tiles: Vec::new(),
            acceptance: 0.0,
            budget_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"snapshot_id": "s", "budget_ms": 150}"#).unwrap();
        assert_eq!(request.stream, "kv_cache");
        assert_eq!(request.max_tiles, 8);
        assert_eq!(request.level_range, LevelRange::new(2, 0));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        assert!(QueryRequest::new("s", 0).validate().is_err());
        assert!(QueryRequest::new("s", 10).with_max_tiles(0).validate().is_err());
        assert!(QueryRequest::new("s", 10).with_max_tiles(33).validate().is_err());
        assert!(QueryRequest::new("s", 10).with_max_tiles(32).validate().is_ok());
        assert!(QueryRequest::new("s", 10)
            .with_level_range(LevelRange::new(0, 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_empty_plan() {
        let plan = QueryPlan::empty(250);
        assert!(plan.is_empty());
        assert_eq!(plan.acceptance, 0.0);
        assert_eq!(plan.budget_ms, 250);
    }
}
