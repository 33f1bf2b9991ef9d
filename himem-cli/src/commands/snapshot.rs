//! Snapshot CLI commands.

use clap::Subcommand;
use himem::{HierarchicalMemory, MergePolicy, SnapshotProvenance, SnapshotSpec};

use super::common::{parse_tag, print_json};
use crate::error::CliError;

/// Snapshot subcommands.
#[derive(Debug, Subcommand)]
pub enum SnapshotCommands {
    /// Create a new snapshot
    Create {
        /// Snapshot id (used as a directory name)
        snapshot_id: String,

        /// Model that produced the snapshot
        #[arg(long)]
        model: String,

        /// Code revision that produced the snapshot
        #[arg(long)]
        code_sha: String,

        /// CUDA version
        #[arg(long)]
        cuda: Option<String>,

        /// Driver version
        #[arg(long)]
        driver: Option<String>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Parent snapshot id (repeatable)
        #[arg(long = "parent")]
        parents: Vec<String>,

        /// Tag as KEY=VALUE (repeatable)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,

        /// Merge policy: lww or manual
        #[arg(long, default_value = "lww")]
        merge_policy: MergePolicy,
    },

    /// List snapshots, newest first
    List {
        /// Only show the N newest
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one snapshot
    Show {
        snapshot_id: String,
    },
}

/// Run a snapshot subcommand.
pub fn run(memory: &HierarchicalMemory, command: SnapshotCommands) -> Result<(), CliError> {
    match command {
        SnapshotCommands::Create {
            snapshot_id,
            model,
            code_sha,
            cuda,
            driver,
            seed,
            parents,
            tags,
            merge_policy,
        } => {
            let provenance = SnapshotProvenance {
                model,
                code_sha,
                cuda,
                driver,
                seed,
            };
            let mut spec = SnapshotSpec::new(snapshot_id, provenance).with_merge_policy(merge_policy);
            spec.parents = parents;
            spec.tags = tags.into_iter().collect();

            let snapshot = memory.create_snapshot(spec)?;
            print_json(&snapshot)
        }
        SnapshotCommands::List { limit } => {
            let snapshots = match limit {
                Some(limit) => memory.list_recent_snapshots(limit)?,
                None => memory.list_snapshots()?,
            };
            print_json(&snapshots)
        }
        SnapshotCommands::Show { snapshot_id } => print_json(&memory.get_snapshot(&snapshot_id)?),
    }
}
