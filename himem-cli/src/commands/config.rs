//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use himem::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, explicit: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_path(explicit);
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(config_file_path)
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_or_default(Some(path))?;
    let source = if path.exists() { "file" } else { "defaults" };

    println!("# {} ({})", path.display(), source);
    println!("[store]");
    println!("  root = {}", config.store.root.display());
    println!("  db_file = {}", config.store.db_file);
    println!("  cache_size_kib = {}", config.store.cache_size_kib);
    println!();
    println!("[planner]");
    println!("  hint_window = {}", config.planner.hint_window);
    println!("  candidate_multiplier = {}", config.planner.candidate_multiplier);
    println!("  min_candidates = {}", config.planner.min_candidates);
    println!();
    println!("[logging]");
    println!("  level = {}", config.logging.level);
    match &config.logging.directory {
        Some(dir) => println!("  directory = {}", dir.display()),
        None => println!("  directory = (not set)"),
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("Configuration file: {}", path.display());
    println!("Edit this file to customize the store; CLI flags override it.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        run_init(&path, false).unwrap();
        assert!(path.exists());
        assert!(matches!(run_init(&path, false), Err(CliError::Usage(_))));
        run_init(&path, true).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/etc/himem.ini");
        assert_eq!(resolve_path(Some(explicit)), PathBuf::from("/etc/himem.ini"));
    }
}
