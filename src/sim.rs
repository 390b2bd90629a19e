//! Simulation driver
//!
//! Feeds a parsed command stream to the allocator in order. Allocator errors
//! are recoverable by design: they are logged, counted, and the run
//! continues with the next command. Only the trace layer can abort a run.

use crate::alloc::{AllocatorStats, Block, MemoryAllocator, PlacementPolicy, ProcessId};
use crate::trace::{Command, Trace};
use serde::Serialize;
use tracing::{debug, warn};

/// Counters accumulated over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    /// Commands processed, including rejected ones
    pub commands: u64,
    /// Allocations that failed even after the compaction retry
    pub failed_allocations: u64,
    /// Deallocations for processes holding nothing
    pub failed_deallocations: u64,
    /// `P` commands seen
    pub reports: u64,
}

/// One simulation run over a single allocator instance
pub struct Simulation {
    allocator: MemoryAllocator,
    summary: SimulationSummary,
}

impl Simulation {
    /// Create a run over a fresh address space
    pub fn new(capacity: u64, policy: PlacementPolicy) -> Self {
        Self {
            allocator: MemoryAllocator::new(capacity, policy),
            summary: SimulationSummary::default(),
        }
    }

    /// Apply one command
    ///
    /// Returns the current layout when the command requests a report (`P`);
    /// the caller decides how to render it.
    pub fn apply(&mut self, command: Command) -> Option<Vec<Block>> {
        self.summary.commands += 1;

        match command {
            Command::Allocate { owner, size } => {
                if let Err(err) = self.allocator.allocate(owner, size) {
                    warn!("cannot allocate process {owner}: {err}");
                    self.summary.failed_allocations += 1;
                }
                self.trace_layout(owner);
                None
            }
            Command::Deallocate { owner } => {
                if let Err(err) = self.allocator.deallocate(owner) {
                    warn!("cannot deallocate process {owner}: {err}");
                    self.summary.failed_deallocations += 1;
                }
                self.trace_layout(owner);
                None
            }
            Command::Print => {
                self.summary.reports += 1;
                Some(self.allocator.snapshot())
            }
        }
    }

    /// Apply a command sequence in order, discarding report layouts
    pub fn apply_all(&mut self, commands: &[Command]) {
        for &command in commands {
            self.apply(command);
        }
    }

    /// Build a run from a trace header and drive every command through it
    pub fn run(trace: &Trace) -> Self {
        let mut sim = Self::new(trace.capacity, trace.policy);
        sim.apply_all(&trace.commands);
        sim
    }

    pub fn allocator(&self) -> &MemoryAllocator {
        &self.allocator
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.allocator.snapshot()
    }

    pub fn stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    pub fn summary(&self) -> SimulationSummary {
        self.summary
    }

    /// Layout dump after each mutating command, visible under debug logging
    fn trace_layout(&self, owner: ProcessId) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            for block in self.allocator.snapshot() {
                debug!(process = %owner, "{block}");
            }
        }
    }
}
