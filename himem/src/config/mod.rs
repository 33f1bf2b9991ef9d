//! Configuration for the tile memory.
//!
//! [`StoreConfig`] is what [`crate::HierarchicalMemory::open`] consumes.
//! [`ConfigFile`] is the on-disk INI form the CLI reads and writes; it
//! translates into a `StoreConfig` and a [`crate::logging::LoggingConfig`].

mod file;
mod store;

pub use file::{config_file_path, ConfigError, ConfigFile, LoggingSettings, StoreSettings};
pub use store::{
    default_store_root, PlannerConfig, StoreConfig, DEFAULT_CACHE_SIZE_KIB,
    DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_DB_FILE, DEFAULT_HINT_WINDOW, DEFAULT_MIN_CANDIDATES,
};

/// Format a byte count for humans (`1.5 KB`, `20.0 GB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(20 * 1024 * 1024 * 1024), "20.0 GB");
    }
}
