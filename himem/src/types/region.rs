//! Level ranges and grid-space boxes.
//!
//! Coordinates are whatever the caller says they are (pixels, embedding
//! buckets, time buckets). Nothing here assumes a pyramid geometry.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Inclusive range of pyramid levels, written `(max, min)`.
///
/// Serialized as a two-element array `[max, min]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct LevelRange {
    pub max: u32,
    pub min: u32,
}

impl LevelRange {
    /// Create a range. Validity (`max >= min`) is checked by [`LevelRange::is_valid`].
    pub const fn new(max: u32, min: u32) -> Self {
        Self { max, min }
    }

    /// A range covering exactly one level.
    pub const fn single(level: u32) -> Self {
        Self {
            max: level,
            min: level,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.max >= self.min
    }

    pub fn contains(&self, level: u32) -> bool {
        self.min <= level && level <= self.max
    }

    /// Levels shared by both ranges, if any.
    pub fn overlap(&self, other: &LevelRange) -> Option<LevelRange> {
        let upper = self.max.min(other.max);
        let lower = self.min.max(other.min);
        (upper >= lower).then_some(LevelRange::new(upper, lower))
    }

    /// Iterate levels from finest to coarsest.
    pub fn levels(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self::new(2, 0)
    }
}

impl From<(u32, u32)> for LevelRange {
    fn from((max, min): (u32, u32)) -> Self {
        Self::new(max, min)
    }
}

impl From<LevelRange> for (u32, u32) {
    fn from(range: LevelRange) -> Self {
        (range.max, range.min)
    }
}

impl fmt::Display for LevelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}..=L{}", self.min, self.max)
    }
}

/// Axis-aligned box in grid space: origin plus extent.
///
/// Serialized as `[x, y, width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl BoundingBox {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when both extents are positive.
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Inclusive corner form, or `None` for a degenerate box.
    pub fn normalize(&self) -> Option<GridRect> {
        if !self.has_area() {
            return None;
        }
        Some(GridRect {
            x_min: self.x,
            x_max: self.x.saturating_add(self.width - 1),
            y_min: self.y,
            y_max: self.y.saturating_add(self.height - 1),
        })
    }

    /// Whether the grid cell `(x, y)` lies inside the box.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.normalize().is_some_and(|rect| rect.contains(x, y))
    }
}

impl From<[i64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [i64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [i64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// Inclusive rectangle `x_min..=x_max` × `y_min..=y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridRect {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl GridRect {
    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.x_min <= x && x <= self.x_max && self.y_min <= y && y <= self.y_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_range_overlap() {
        let request = LevelRange::new(2, 0);
        assert_eq!(
            request.overlap(&LevelRange::new(5, 1)),
            Some(LevelRange::new(2, 1))
        );
        assert_eq!(request.overlap(&LevelRange::new(4, 3)), None);
        assert_eq!(
            request.overlap(&LevelRange::single(0)),
            Some(LevelRange::single(0))
        );
    }

    #[test]
    fn test_level_range_validity_and_levels() {
        assert!(LevelRange::new(2, 0).is_valid());
        assert!(!LevelRange::new(0, 2).is_valid());
        assert_eq!(LevelRange::new(3, 1).levels().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(LevelRange::new(3, 1).contains(1));
        assert!(!LevelRange::new(3, 1).contains(0));
    }

    #[test]
    fn test_level_range_serializes_as_pair() {
        let json = serde_json::to_string(&LevelRange::new(2, 0)).unwrap();
        assert_eq!(json, "[2,0]");
        let back: LevelRange = serde_json::from_str("[4,1]").unwrap();
        assert_eq!(back, LevelRange::new(4, 1));
    }

    #[test]
    fn test_bbox_contains_is_half_open_on_extent() {
        let b = BoundingBox::new(2, 3, 2, 1);
        assert!(b.contains(2, 3));
        assert!(b.contains(3, 3));
        assert!(!b.contains(4, 3));
        assert!(!b.contains(2, 4));
    }

    #[test]
    fn test_degenerate_bbox_contains_nothing() {
        assert!(BoundingBox::new(0, 0, 0, 5).normalize().is_none());
        assert!(!BoundingBox::new(0, 0, 5, -1).contains(0, 0));
    }

    #[test]
    fn test_bbox_serializes_as_quad() {
        let json = serde_json::to_string(&BoundingBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
    }
}
