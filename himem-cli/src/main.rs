//! himem CLI - command-line access to a tile memory store
//!
//! Every data command opens the store, runs one operation and prints JSON
//! on stdout. Logs go to stderr (and optionally a file).

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use himem::config::ConfigFile;
use himem::logging::init_logging;
use himem::HierarchicalMemory;
use tracing::debug;

use commands::config::ConfigCommands;
use commands::hint::HintCommands;
use commands::plan::PlanArgs;
use commands::snapshot::SnapshotCommands;
use commands::tile::TileCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "himem", version, about = "Hierarchical content-addressed tile memory")]
struct Cli {
    /// Store root directory (overrides [store] root)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Configuration file (default: ~/.himem/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `himem=trace` (overrides [logging] level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create and inspect snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Ingest, fetch and list tiles
    Tile {
        #[command(subcommand)]
        command: TileCommands,
    },

    /// Log and inspect prefetch hints
    Hint {
        #[command(subcommand)]
        command: HintCommands,
    },

    /// Rank tiles for a query
    Plan(PlanArgs),

    /// Show store totals
    Stats {
        /// Human-readable output instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let command = match cli.command {
        Commands::Config { command } => {
            return commands::config::run(command, cli.config.as_deref());
        }
        other => other,
    };

    let file = ConfigFile::load_or_default(cli.config.as_deref())?;
    let mut logging = file.logging_config();
    if let Some(level) = cli.log_level {
        logging.level = level;
    }
    let _guard = init_logging(&logging)?;

    let mut store_config = file.to_store_config();
    if let Some(root) = cli.root {
        store_config.root = root;
    }
    debug!(root = %store_config.root.display(), "Opening store");
    let memory = HierarchicalMemory::open(&store_config)?;

    match command {
        Commands::Snapshot { command } => commands::snapshot::run(&memory, command),
        Commands::Tile { command } => commands::tile::run(&memory, command),
        Commands::Hint { command } => commands::hint::run(&memory, command),
        Commands::Plan(args) => commands::plan::run(&memory, args),
        Commands::Stats { human } => commands::stats::run(&memory, human),
        Commands::Config { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan_defaults() {
        let cli = Cli::try_parse_from(["himem", "--root", "/tmp/him", "plan", "snp"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/him")));
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.snapshot_id, "snp");
                assert_eq!(args.stream, "kv_cache");
                assert_eq!(args.max_tiles, 8);
                assert_eq!(args.levels, himem::LevelRange::new(2, 0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_tile_put_single() {
        let cli = Cli::try_parse_from([
            "himem", "tile", "put", "payload.bin", "--snapshot", "s1", "--stream", "v", "--level",
            "1", "-x", "2", "-y", "3", "--shape", "4,8,8",
        ])
        .unwrap();
        match cli.command {
            Commands::Tile {
                command: TileCommands::Put(args),
            } => {
                assert_eq!(args.payload, Some(PathBuf::from("payload.bin")));
                assert_eq!((args.level, args.x, args.y), (1, 2, 3));
                assert_eq!(args.shape, Some([4, 8, 8]));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_snapshot_create() {
        let cli = Cli::try_parse_from([
            "himem", "snapshot", "create", "snp_1", "--model", "m", "--code-sha", "abc", "--tag",
            "task_id=T1", "--parent", "root", "--merge-policy", "manual",
        ])
        .unwrap();
        match cli.command {
            Commands::Snapshot {
                command:
                    SnapshotCommands::Create {
                        tags,
                        parents,
                        merge_policy,
                        ..
                    },
            } => {
                assert_eq!(tags, vec![("task_id".to_string(), "T1".to_string())]);
                assert_eq!(parents, vec!["root".to_string()]);
                assert_eq!(merge_policy, himem::MergePolicy::Manual);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_level_range_rejected() {
        assert!(Cli::try_parse_from(["himem", "plan", "snp", "--levels", "0:2"]).is_err());
    }

    #[test]
    fn test_end_to_end_against_temp_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let memory =
            HierarchicalMemory::open(&himem::StoreConfig::new(dir.path().join("store"))).unwrap();
        let payload = dir.path().join("tile.bin");
        std::fs::write(&payload, b"abc").unwrap();

        let parse = |args: &[&str]| Cli::try_parse_from(args.iter().copied()).unwrap().command;
        let exec = |command: Commands| match command {
            Commands::Snapshot { command } => commands::snapshot::run(&memory, command),
            Commands::Tile { command } => commands::tile::run(&memory, command),
            Commands::Plan(args) => commands::plan::run(&memory, args),
            other => panic!("unexpected command: {other:?}"),
        };

        exec(parse(&[
            "himem", "snapshot", "create", "s1", "--model", "m", "--code-sha", "c",
        ]))
        .unwrap();
        exec(parse(&[
            "himem",
            "tile",
            "put",
            payload.to_str().unwrap(),
            "--snapshot",
            "s1",
            "--stream",
            "kv_cache",
        ]))
        .unwrap();
        exec(parse(&["himem", "plan", "s1", "--levels", "0:0", "--max-tiles", "1"])).unwrap();

        let (_, bytes) = memory.get_tile_by_coordinate("kv_cache", "s1", 0, 0, 0).unwrap();
        assert_eq!(bytes, b"abc");
    }
}
