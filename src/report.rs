//! Snapshot rendering
//!
//! The `P` command and the end-of-run report both render the address-ordered
//! layout: one row per block with its half-open span, state, size, and owner.

use crate::alloc::{AllocatorStats, Block};
use comfy_table::Table;
use serde::Serialize;

/// Render a layout as a text table
pub fn layout_table(blocks: &[Block]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Start", "End", "State", "Size", "Process"]);

    for block in blocks {
        table.add_row(vec![
            block.start.to_string(),
            block.end().to_string(),
            if block.is_free() { "FREE" } else { "FULL" }.to_string(),
            block.length.to_string(),
            block
                .owner
                .map(|owner| owner.to_string())
                .unwrap_or_default(),
        ]);
    }

    table
}

/// One-line occupancy summary
pub fn summary_line(stats: &AllocatorStats) -> String {
    format!(
        "{}/{} units allocated across {} blocks, {} free across {} blocks (largest {}), {} compactions",
        stats.allocated_units,
        stats.capacity,
        stats.allocated_blocks,
        stats.free_units,
        stats.free_blocks,
        stats.largest_free,
        stats.compactions,
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    blocks: &'a [Block],
    stats: &'a AllocatorStats,
}

/// Serialize a layout and its counters as a pretty-printed JSON document
pub fn snapshot_json(blocks: &[Block], stats: &AllocatorStats) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport { blocks, stats })
}
