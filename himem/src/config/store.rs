//! Runtime configuration for an opened store.

use std::path::PathBuf;

/// Default database file name inside the store root.
pub const DEFAULT_DB_FILE: &str = "him.db";

/// Default number of recent hints the planner reads per query.
pub const DEFAULT_HINT_WINDOW: usize = 64;

/// Default heap capacity multiplier (capacity = `max_tiles × multiplier`).
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 8;

/// Default floor on the planner's heap capacity.
pub const DEFAULT_MIN_CANDIDATES: usize = 32;

/// Default SQLite page cache size in KiB (≈100 MB).
pub const DEFAULT_CACHE_SIZE_KIB: u32 = 100_000;

/// Where the store lives and how SQLite is tuned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory holding the database and the payload tree.
    pub root: PathBuf,

    /// Database file name, relative to `root`.
    pub db_file: String,

    /// SQLite page cache size in KiB.
    pub cache_size_kib: u32,

    /// Planner tuning.
    pub planner: PlannerConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            db_file: DEFAULT_DB_FILE.to_string(),
            cache_size_kib: DEFAULT_CACHE_SIZE_KIB,
            planner: PlannerConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set the database file name.
    pub fn with_db_file(mut self, db_file: impl Into<String>) -> Self {
        self.db_file = db_file.into();
        self
    }

    /// Set the SQLite page cache size.
    pub fn with_cache_size_kib(mut self, kib: u32) -> Self {
        self.cache_size_kib = kib;
        self
    }

    /// Set the planner configuration.
    pub fn with_planner(mut self, planner: PlannerConfig) -> Self {
        self.planner = planner;
        self
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.root.join(&self.db_file)
    }

    /// Root of the payload tree.
    pub fn tiles_dir(&self) -> PathBuf {
        self.root.join("tiles")
    }
}

/// Planner tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// How many recent hints feed one plan.
    pub hint_window: usize,

    /// Heap capacity per requested tile.
    pub candidate_multiplier: usize,

    /// Minimum heap capacity.
    pub min_candidates: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hint_window: DEFAULT_HINT_WINDOW,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            min_candidates: DEFAULT_MIN_CANDIDATES,
        }
    }
}

impl PlannerConfig {
    pub fn with_hint_window(mut self, window: usize) -> Self {
        self.hint_window = window;
        self
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier;
        self
    }

    pub fn with_min_candidates(mut self, min: usize) -> Self {
        self.min_candidates = min;
        self
    }

    /// Heap capacity for a request asking for `max_tiles` tiles.
    pub fn candidate_capacity(&self, max_tiles: usize) -> usize {
        max_tiles
            .saturating_mul(self.candidate_multiplier)
            .max(self.min_candidates)
            .max(max_tiles)
    }
}

/// Default store root: `~/.himem/data`, or `./data` without a home dir.
pub fn default_store_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".himem").join("data"))
        .unwrap_or_else(|| PathBuf::from("data"))
}
