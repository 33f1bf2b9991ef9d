//! Prefetch hint types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::region::{BoundingBox, LevelRange};

/// Where future queries against a snapshot are likely to look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHint {
    pub query_id: String,
    pub snapshot_id: String,
    pub stream: String,
    pub level_range: LevelRange,
    pub bboxes: Vec<BoundingBox>,
    pub confidence: f64,
}

impl QueryHint {
    /// Check the level range and confidence.
    pub fn validate(&self) -> Result<(), String> {
        if !self.level_range.is_valid() {
            return Err(format!(
                "level_range must be (max_level, min_level), got ({}, {})",
                self.level_range.max, self.level_range.min
            ));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            ));
        }
        Ok(())
    }
}

/// A hint as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedHint {
    /// Log sequence number (insertion order).
    pub seq: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub hint: QueryHint,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(level_range: LevelRange, confidence: f64) -> QueryHint {
        QueryHint {
            query_id: "q1".into(),
            snapshot_id: "s".into(),
            stream: "v".into(),
            level_range,
            bboxes: vec![BoundingBox::new(0, 0, 4, 4)],
            confidence,
        }
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(hint(LevelRange::new(2, 0), 0.0).validate().is_ok());
        assert!(hint(LevelRange::new(2, 0), 1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        assert!(hint(LevelRange::new(0, 2), 0.5).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        assert!(hint(LevelRange::new(2, 0), 1.5).validate().is_err());
        assert!(hint(LevelRange::new(2, 0), f64::NAN).validate().is_err());
    }

    #[test]
    fn test_hint_json_shape() {
        let value = serde_json::to_value(hint(LevelRange::new(2, 0), 0.9)).unwrap();
        assert_eq!(value["level_range"], serde_json::json!([2, 0]));
        assert_eq!(value["bboxes"], serde_json::json!([[0, 0, 4, 4]]));
    }
}
