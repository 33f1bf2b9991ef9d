//! Query planner.
//!
//! Picks a small ranked set of tiles for a request by fusing three signals:
//! the tile's level, how often and how recently it has been read, and
//! whether recent hints point at it. Candidates stream through a
//! [`BoundedHeap`] so work stays bounded regardless of snapshot size.
//!
//! The planner only returns references. Callers fetch payloads with point
//! lookups, which in turn feed usage back into later plans.

mod bounded;
mod score;

pub use bounded::BoundedHeap;
pub use score::{score_tile, HintIndex, HintRegion, TileScore};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::PlannerConfig;
use crate::error::{StoreError, StoreResult};
use crate::hints::HintLog;
use crate::repository::timestamp;
use crate::store::TileStore;
use crate::types::{QueryPlan, QueryRequest, QueryTile, TileFilter};

use score::Candidate;

const ACCEPTANCE_BASE: f64 = 0.55;
const ACCEPTANCE_PER_TILE: f64 = 0.08;
const ACCEPTANCE_HINT_WEIGHT: f64 = 0.25;
const ACCEPTANCE_CAP: f64 = 0.99;

/// Estimated likelihood that a plan satisfies its request.
///
/// Zero when nothing was selected, otherwise
/// `min(0.99, 0.55 + 0.08 × selected + 0.25 × hint_hit_ratio)`.
pub fn acceptance(selected: usize, hint_hit_ratio: f64) -> f64 {
    if selected == 0 {
        return 0.0;
    }
    let raw = ACCEPTANCE_BASE
        + ACCEPTANCE_PER_TILE * selected as f64
        + ACCEPTANCE_HINT_WEIGHT * hint_hit_ratio;
    raw.min(ACCEPTANCE_CAP)
}

#[derive(Debug, Clone)]
pub struct QueryPlanner {
    store: TileStore,
    hints: HintLog,
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new(store: TileStore, hints: HintLog, config: PlannerConfig) -> Self {
        Self {
            store,
            hints,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan against the current time.
    pub fn plan(&self, request: &QueryRequest) -> StoreResult<QueryPlan> {
        self.plan_at(request, timestamp::now())
    }

    /// Plan with recency measured against `now`.
    pub fn plan_at(&self, request: &QueryRequest, now: DateTime<Utc>) -> StoreResult<QueryPlan> {
        request.validate().map_err(StoreError::InvalidRequest)?;

        let filter = TileFilter::all()
            .stream(request.stream.clone())
            .levels(request.level_range);
        let tiles = self.store.list_for_snapshot(&request.snapshot_id, &filter)?;
        if tiles.is_empty() {
            debug!(snapshot_id = %request.snapshot_id, stream = %request.stream, "No candidate tiles");
            return Ok(QueryPlan::empty(request.budget_ms));
        }

        let usage = self.store.usage_for_snapshot(&request.snapshot_id)?;
        let hints = self.hints.recent(
            &request.snapshot_id,
            Some(&request.stream),
            Some(request.level_range),
            self.config.hint_window,
        )?;
        let index = HintIndex::build(&hints, request.level_range);

        let mut heap = BoundedHeap::new(self.config.candidate_capacity(request.max_tiles));
        for (position, meta) in tiles.iter().enumerate() {
            let score = score_tile(
                meta,
                usage.get(&meta.tile_id),
                index.regions(meta.level),
                request.level_range,
                now,
            );
            heap.push_bounded_by(
                Candidate {
                    score,
                    index: position,
                    meta,
                },
                Candidate::outscores,
            );
        }
        let retained = heap.len();

        let mut selected = heap.drain_sorted_desc();
        selected.truncate(request.max_tiles);

        let hinted = selected.iter().filter(|c| c.score.hint_bonus > 0.0).count();
        let hint_hit_ratio = if selected.is_empty() {
            0.0
        } else {
            hinted as f64 / selected.len() as f64
        };
        let acceptance = acceptance(selected.len(), hint_hit_ratio);

        debug!(
            snapshot_id = %request.snapshot_id,
            candidates = tiles.len(),
            retained,
            selected = selected.len(),
            hints = hints.len(),
            acceptance,
            "Planned query"
        );

        Ok(QueryPlan {
            tiles: selected.iter().map(|c| QueryTile::from(c.meta)).collect(),
            acceptance,
            budget_ms: request.budget_ms,
        })
    }
}
