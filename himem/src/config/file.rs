//! INI configuration file.
//!
//! ```text
//! [store]
//! root = /home/me/.himem/data
//! db_file = him.db
//! cache_size_kib = 100000
//!
//! [planner]
//! hint_window = 64
//! candidate_multiplier = 8
//! min_candidates = 32
//!
//! [logging]
//! level = info
//! directory = /home/me/.himem/logs
//! ```
//!
//! Missing keys fall back to defaults; a missing file is not an error for
//! [`ConfigFile::load_or_default`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use super::store::{
    default_store_root, PlannerConfig, StoreConfig, DEFAULT_CACHE_SIZE_KIB, DEFAULT_DB_FILE,
};
use crate::logging::LoggingConfig;

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be parsed or read.
    #[error("Failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// The file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key holds a value of the wrong type.
    #[error("Invalid value for {section}.{key}: '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub root: PathBuf,
    pub db_file: String,
    pub cache_size_kib: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            db_file: DEFAULT_DB_FILE.to_string(),
            cache_size_kib: DEFAULT_CACHE_SIZE_KIB,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub store: StoreSettings,
    pub planner: PlannerConfig,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from `path` (or the default location), falling back to defaults
    /// when the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = ConfigFile::default();

        if let Some(section) = ini.section(Some("store")) {
            if let Some(root) = section.get("root") {
                config.store.root = expand_tilde(root);
            }
            if let Some(db_file) = section.get("db_file") {
                config.store.db_file = db_file.trim().to_string();
            }
            if let Some(v) = section.get("cache_size_kib") {
                config.store.cache_size_kib = parse_value("store", "cache_size_kib", v)?;
            }
        }

        if let Some(section) = ini.section(Some("planner")) {
            if let Some(v) = section.get("hint_window") {
                config.planner.hint_window = parse_value("planner", "hint_window", v)?;
            }
            if let Some(v) = section.get("candidate_multiplier") {
                config.planner.candidate_multiplier =
                    parse_value("planner", "candidate_multiplier", v)?;
            }
            if let Some(v) = section.get("min_candidates") {
                config.planner.min_candidates = parse_value("planner", "min_candidates", v)?;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = section.get("level") {
                config.logging.level = level.trim().to_string();
            }
            if let Some(dir) = section.get("directory") {
                let dir = dir.trim();
                config.logging.directory = (!dir.is_empty()).then(|| expand_tilde(dir));
            }
        }

        Ok(config)
    }

    /// Write to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("store"))
            .set("root", self.store.root.display().to_string())
            .set("db_file", self.store.db_file.clone())
            .set("cache_size_kib", self.store.cache_size_kib.to_string());
        ini.with_section(Some("planner"))
            .set("hint_window", self.planner.hint_window.to_string())
            .set(
                "candidate_multiplier",
                self.planner.candidate_multiplier.to_string(),
            )
            .set("min_candidates", self.planner.min_candidates.to_string());
        let directory = self
            .logging
            .directory
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set("directory", directory);
        ini
    }

    /// Translate into the runtime store configuration.
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig::new(self.store.root.clone())
            .with_db_file(self.store.db_file.clone())
            .with_cache_size_kib(self.store.cache_size_kib)
            .with_planner(self.planner)
    }

    /// Translate into the logging configuration.
    pub fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::new(self.logging.level.clone());
        match &self.logging.directory {
            Some(dir) => config.with_directory(dir.clone()),
            None => config,
        }
    }
}

/// Default configuration file location: `~/.himem/config.ini`.
pub fn config_file_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".himem").join("config.ini"))
        .unwrap_or_else(|| PathBuf::from("config.ini"))
}

fn parse_value<T: FromStr>(
    section: &'static str,
    key: &'static str,
    raw: &str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section,
        key,
        value: raw.to_string(),
    })
}

fn expand_tilde(raw: &str) -> PathBuf {
    let raw = raw.trim();
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[store]\nroot = /srv/him\ndb_file = mem.db\ncache_size_kib = 4096\n\n\
             [planner]\nhint_window = 10\ncandidate_multiplier = 4\nmin_candidates = 16\n\n\
             [logging]\nlevel = debug\ndirectory = /var/log/him\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.store.root, PathBuf::from("/srv/him"));
        assert_eq!(config.store.db_file, "mem.db");
        assert_eq!(config.store.cache_size_kib, 4096);
        assert_eq!(config.planner.hint_window, 10);
        assert_eq!(config.planner.candidate_multiplier, 4);
        assert_eq!(config.planner.min_candidates, 16);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.directory, Some(PathBuf::from("/var/log/him")));

        let store = config.to_store_config();
        assert_eq!(store.db_path(), PathBuf::from("/srv/him/mem.db"));
        assert_eq!(store.planner.candidate_capacity(1), 16);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[planner]\nhint_window = 5\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.planner.hint_window, 5);
        assert_eq!(config.planner.min_candidates, 32);
        assert_eq!(config.store.db_file, "him.db");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[planner]\nhint_window = many\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "hint_window",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_or_default(Some(&temp.path().join("absent.ini"))).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");
        let mut config = ConfigFile::default();
        config.store.root = temp.path().join("data");
        config.planner.hint_window = 12;
        config.logging.directory = Some(temp.path().join("logs"));

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
