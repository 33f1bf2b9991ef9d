//! Snapshot value types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How concurrent writers to a snapshot are meant to be reconciled.
///
/// Recorded on the snapshot only; the store never merges snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Last write wins.
    #[default]
    Lww,
    /// Conflicts are resolved by hand.
    Manual,
}

impl MergePolicy {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Lww => "lww",
            MergePolicy::Manual => "manual",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lww" | "last-write-wins" => Ok(MergePolicy::Lww),
            "manual" => Ok(MergePolicy::Manual),
            other => Err(format!("unknown merge policy '{}'", other)),
        }
    }
}

/// Identity of whatever produced a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProvenance {
    /// Model name.
    pub model: String,
    /// Code revision.
    pub code_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SnapshotProvenance {
    /// Create a provenance record with only the required fields.
    pub fn new(model: impl Into<String>, code_sha: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            code_sha: code_sha.into(),
            cuda: None,
            driver: None,
            seed: None,
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Request to create a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSpec {
    pub snapshot_id: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub provenance: SnapshotProvenance,
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

impl SnapshotSpec {
    /// Create a spec with no parents and no tags.
    pub fn new(snapshot_id: impl Into<String>, provenance: SnapshotProvenance) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            parents: Vec::new(),
            tags: BTreeMap::new(),
            provenance,
            merge_policy: MergePolicy::default(),
        }
    }

    /// Append a parent snapshot id.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the merge policy.
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }
}

/// A stored, immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub parents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub provenance: SnapshotProvenance,
    pub merge_policy: MergePolicy,
}
