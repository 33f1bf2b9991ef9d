//! Candidate scoring.
//!
//! ```text
//! score = level_weight + hotness + recency + hint_bonus - distance_penalty
//! ```
//!
//! Finer levels, frequently and recently read tiles, tiles inside hinted
//! regions, and tiles near the grid origin rank higher.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{GridRect, LevelRange, QueryHint, TileMeta, TileUsage};

pub const LEVEL_WEIGHT: f64 = 3.0;
pub const HOTNESS_WEIGHT: f64 = 2.0;
/// Minutes after the last access at which the recency bonus reaches zero.
pub const RECENCY_WINDOW_MINUTES: f64 = 6.0;
pub const HINT_WEIGHT: f64 = 12.0;
pub const DISTANCE_WEIGHT: f64 = 0.25;

/// A hinted box in inclusive corner form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HintRegion {
    pub rect: GridRect,
    pub confidence: f64,
}

/// Hinted regions per level, restricted to the request's level range.
#[derive(Debug, Default)]
pub struct HintIndex {
    by_level: HashMap<u32, Vec<HintRegion>>,
}

impl HintIndex {
    /// Index every non-degenerate box of every hint under each level its
    /// range shares with `request`.
    pub fn build(hints: &[QueryHint], request: LevelRange) -> Self {
        let mut by_level: HashMap<u32, Vec<HintRegion>> = HashMap::new();
        for hint in hints {
            let Some(overlap) = request.overlap(&hint.level_range) else {
                continue;
            };
            let regions: Vec<HintRegion> = hint
                .bboxes
                .iter()
                .filter_map(|b| b.normalize())
                .map(|rect| HintRegion {
                    rect,
                    confidence: hint.confidence,
                })
                .collect();
            if regions.is_empty() {
                continue;
            }
            for level in overlap.levels() {
                by_level.entry(level).or_default().extend_from_slice(&regions);
            }
        }
        Self { by_level }
    }

    pub fn regions(&self, level: u32) -> &[HintRegion] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Score components for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileScore {
    pub score: f64,
    pub hint_bonus: f64,
}

pub fn score_tile(
    meta: &TileMeta,
    usage: Option<&TileUsage>,
    regions: &[HintRegion],
    request: LevelRange,
    now: DateTime<Utc>,
) -> TileScore {
    let level_weight = (f64::from(request.max) - f64::from(meta.level)) * LEVEL_WEIGHT;

    let (hotness, recency) = match usage {
        Some(usage) => {
            let hotness = (usage.access_count as f64).ln_1p() * HOTNESS_WEIGHT;
            let recency = usage.last_access.map_or(0.0, |last| {
                let minutes = (now - last).num_milliseconds() as f64 / 60_000.0;
                (RECENCY_WINDOW_MINUTES - minutes).max(0.0)
            });
            (hotness, recency)
        }
        None => (0.0, 0.0),
    };

    let (x, y) = (i64::from(meta.x), i64::from(meta.y));
    let hint_bonus: f64 = regions
        .iter()
        .filter(|region| region.rect.contains(x, y))
        .map(|region| region.confidence * HINT_WEIGHT)
        .sum();

    let distance_penalty = (f64::from(meta.x) + f64::from(meta.y)) * DISTANCE_WEIGHT;

    TileScore {
        score: level_weight + hotness + recency + hint_bonus - distance_penalty,
        hint_bonus,
    }
}

/// A scored tile awaiting selection.
///
/// Ordered by `(score, index)`: among equal scores the later scan position
/// ranks higher. Heap admission compares scores alone (see
/// [`Candidate::outscores`]).
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub score: TileScore,
    pub index: usize,
    pub meta: &'a TileMeta,
}

impl Candidate<'_> {
    /// Whether this candidate may evict `min` from a full heap.
    pub fn outscores(&self, min: &Self) -> bool {
        self.score.score > min.score.score
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .score
            .total_cmp(&other.score.score)
            .then_with(|| self.index.cmp(&other.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use chrono::Duration;

    fn meta(level: u32, x: u32, y: u32) -> TileMeta {
        TileMeta {
            tile_id: format!("t{}{}{}", level, x, y),
            stream: "v".into(),
            snapshot_id: "s".into(),
            level,
            x,
            y,
            shape: [1, 1, 1],
            dtype: "raw".into(),
            parent_tile_id: None,
            halo: None,
            checksum: String::new(),
            size_bytes: 0,
            created_at: Utc::now(),
            access_count: 0,
            last_access: None,
        }
    }

    fn hint(range: LevelRange, bboxes: Vec<BoundingBox>, confidence: f64) -> QueryHint {
        QueryHint {
            query_id: "q".into(),
            snapshot_id: "s".into(),
            stream: "v".into(),
            level_range: range,
            bboxes,
            confidence,
        }
    }

    #[test]
    fn test_cold_tile_score() {
        let now = Utc::now();
        let s = score_tile(&meta(0, 2, 2), None, &[], LevelRange::new(2, 0), now);
        assert_eq!(s.hint_bonus, 0.0);
        assert!((s.score - (6.0 - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_usage_adds_hotness_and_recency() {
        let now = Utc::now();
        let usage = TileUsage {
            access_count: 3,
            last_access: Some(now - Duration::minutes(2)),
        };
        let s = score_tile(&meta(2, 0, 0), Some(&usage), &[], LevelRange::new(2, 0), now);
        let expected = 4f64.ln() * 2.0 + 4.0;
        assert!((s.score - expected).abs() < 1e-6);

        let stale = TileUsage {
            access_count: 0,
            last_access: Some(now - Duration::minutes(30)),
        };
        let s = score_tile(&meta(2, 0, 0), Some(&stale), &[], LevelRange::new(2, 0), now);
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn test_hint_index_clips_levels_and_drops_degenerate_boxes() {
        let hints = vec![
            hint(
                LevelRange::new(5, 1),
                vec![BoundingBox::new(0, 0, 2, 2), BoundingBox::new(0, 0, 0, 2)],
                0.5,
            ),
            hint(LevelRange::new(9, 8), vec![BoundingBox::new(0, 0, 2, 2)], 1.0),
        ];
        let index = HintIndex::build(&hints, LevelRange::new(2, 0));
        assert!(index.regions(0).is_empty());
        assert_eq!(index.regions(1).len(), 1);
        assert_eq!(index.regions(2).len(), 1);
        assert!(index.regions(3).is_empty());
    }

    #[test]
    fn test_hint_bonus_sums_containing_regions() {
        let hints = vec![
            hint(LevelRange::new(0, 0), vec![BoundingBox::new(0, 0, 4, 4)], 0.5),
            hint(LevelRange::new(0, 0), vec![BoundingBox::new(1, 1, 1, 1)], 0.25),
        ];
        let index = HintIndex::build(&hints, LevelRange::new(2, 0));
        let now = Utc::now();

        let inside_both = score_tile(&meta(0, 1, 1), None, index.regions(0), LevelRange::new(2, 0), now);
        assert!((inside_both.hint_bonus - 9.0).abs() < 1e-9);

        let outside = score_tile(&meta(0, 9, 9), None, index.regions(0), LevelRange::new(2, 0), now);
        assert_eq!(outside.hint_bonus, 0.0);
    }

    #[test]
    fn test_candidate_order_prefers_later_on_tie() {
        let m = meta(0, 0, 0);
        let score = TileScore {
            score: 1.0,
            hint_bonus: 0.0,
        };
        let early = Candidate { score, index: 0, meta: &m };
        let late = Candidate { score, index: 1, meta: &m };
        assert!(late > early);
        assert!(!late.outscores(&early));

        let better = Candidate {
            score: TileScore {
                score: 2.0,
                hint_bonus: 0.0,
            },
            index: 5,
            meta: &m,
        };
        assert!(better > early);
        assert!(better.outscores(&late));
    }
}
