//! Plan command - rank tiles for a query.

use clap::Args;
use himem::types::{DEFAULT_MAX_TILES, DEFAULT_QUERY_STREAM};
use himem::{HierarchicalMemory, LevelRange, QueryRequest};

use super::common::{parse_level_range, print_json};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Snapshot to plan against
    pub snapshot_id: String,

    /// What the caller is looking for (recorded, not interpreted)
    #[arg(long, default_value = "")]
    pub goal: String,

    #[arg(long, default_value = DEFAULT_QUERY_STREAM)]
    pub stream: String,

    /// Advisory latency budget in milliseconds
    #[arg(long, default_value_t = 150)]
    pub budget_ms: u64,

    /// Number of tiles to return (1-32)
    #[arg(long, default_value_t = DEFAULT_MAX_TILES)]
    pub max_tiles: usize,

    /// Level range as MAX:MIN
    #[arg(long, value_parser = parse_level_range, default_value = "2:0")]
    pub levels: LevelRange,
}

impl From<PlanArgs> for QueryRequest {
    fn from(args: PlanArgs) -> Self {
        QueryRequest::new(args.snapshot_id, args.budget_ms)
            .with_goal(args.goal)
            .with_stream(args.stream)
            .with_max_tiles(args.max_tiles)
            .with_level_range(args.levels)
    }
}

/// Run the plan command.
pub fn run(memory: &HierarchicalMemory, args: PlanArgs) -> Result<(), CliError> {
    let request = QueryRequest::from(args);
    let plan = memory.plan(&request)?;
    print_json(&plan)
}
