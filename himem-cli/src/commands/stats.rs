//! Stats command - store totals.

use himem::config::format_size;
use himem::HierarchicalMemory;

use super::common::print_json;
use crate::error::CliError;

/// Run the stats command.
pub fn run(memory: &HierarchicalMemory, human: bool) -> Result<(), CliError> {
    let stats = memory.stats()?;
    if !human {
        return print_json(&stats);
    }

    println!("Store: {}", memory.root().display());
    println!("  Snapshots: {}", stats.snapshots);
    println!("  Tiles:     {}", stats.tiles);
    println!("  Payload:   {}", format_size(stats.payload_bytes));
    println!("  Hints:     {}", stats.hints);
    Ok(())
}
