//! Hint CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use himem::{BoundingBox, HierarchicalMemory, LevelRange, QueryHint};

use super::common::{parse_bbox, parse_level_range, print_json, read_json_file};
use crate::error::CliError;

/// Default number of hints `hint list` shows.
const DEFAULT_LIST_LIMIT: usize = 50;

/// Hint subcommands.
#[derive(Debug, Subcommand)]
pub enum HintCommands {
    /// Log a prefetch hint, or a batch of them from a JSON file
    Add {
        /// JSON file holding an array of hints
        #[arg(long, conflicts_with_all = ["query_id", "snapshot", "stream", "bboxes"])]
        batch: Option<PathBuf>,

        /// Query identifier
        #[arg(long)]
        query_id: Option<String>,

        /// Snapshot the hint refers to
        #[arg(long)]
        snapshot: Option<String>,

        /// Stream the hint refers to
        #[arg(long)]
        stream: Option<String>,

        /// Level range as MAX:MIN
        #[arg(long, value_parser = parse_level_range, default_value = "2:0")]
        levels: LevelRange,

        /// Region as X,Y,W,H (repeatable)
        #[arg(long = "bbox", value_parser = parse_bbox)]
        bboxes: Vec<BoundingBox>,

        /// Confidence in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
    },

    /// Show recent hints for a snapshot
    List {
        /// Snapshot id (omit with --all)
        #[arg(required_unless_present = "all")]
        snapshot_id: Option<String>,

        /// Only hints for this stream
        #[arg(long)]
        stream: Option<String>,

        /// Only hints overlapping MAX:MIN
        #[arg(long, value_parser = parse_level_range)]
        levels: Option<LevelRange>,

        /// Maximum number of hints
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// Dump the whole log in insertion order
        #[arg(long)]
        all: bool,
    },
}

/// Run a hint subcommand.
pub fn run(memory: &HierarchicalMemory, command: HintCommands) -> Result<(), CliError> {
    match command {
        HintCommands::Add {
            batch: Some(path),
            ..
        } => {
            let hints: Vec<QueryHint> = read_json_file(&path)?;
            let count = hints.len();
            memory.log_hints(hints)?;
            print_json(&serde_json::json!({ "logged": count }))
        }
        HintCommands::Add {
            batch: None,
            query_id,
            snapshot,
            stream,
            levels,
            bboxes,
            confidence,
        } => {
            let hint = QueryHint {
                query_id: required(query_id, "--query-id")?,
                snapshot_id: required(snapshot, "--snapshot")?,
                stream: required(stream, "--stream")?,
                level_range: levels,
                bboxes,
                confidence,
            };
            memory.log_hints(vec![hint])?;
            print_json(&serde_json::json!({ "logged": 1 }))
        }
        HintCommands::List { all: true, .. } => print_json(&memory.all_hints()?),
        HintCommands::List {
            snapshot_id,
            stream,
            levels,
            limit,
            all: false,
        } => {
            let snapshot_id = required(snapshot_id, "SNAPSHOT_ID")?;
            let hints = memory.recent_hints(&snapshot_id, stream.as_deref(), levels, limit)?;
            print_json(&hints)
        }
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, CliError> {
    value.ok_or_else(|| CliError::Usage(format!("{} is required", name)))
}
