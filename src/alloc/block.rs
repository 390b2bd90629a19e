//! Block metadata for the simulated address space

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a simulated process holding memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Create a new process ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable handle to a block in the allocator's arena
///
/// Handles index the arena directly; the address and fit indices store
/// handles rather than block copies, so a block is updated in exactly one
/// place and the indices can never hold a stale span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block#{}", self.0)
    }
}

/// Allocation state of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// Block is free and available for placement
    Free,
    /// Block is held by a process
    Allocated,
}

impl BlockState {
    /// Check if the block is free
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Check if the block is allocated
    pub const fn is_allocated(&self) -> bool {
        matches!(self, Self::Allocated)
    }
}

/// A contiguous span `[start, start + length)` of the address space
///
/// Spans are half-open: `end()` is one past the last unit. `owner` is
/// present exactly when the block is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// First unit of the span
    pub start: u64,
    /// Number of units in the span (always > 0)
    pub length: u64,
    /// Holding process, present iff allocated
    pub owner: Option<ProcessId>,
    /// Free or allocated
    pub state: BlockState,
}

impl Block {
    /// Create a free block over `[start, start + length)`
    pub fn free(start: u64, length: u64) -> Self {
        Self {
            start,
            length,
            owner: None,
            state: BlockState::Free,
        }
    }

    /// Create an allocated block held by `owner`
    pub fn allocated(owner: ProcessId, start: u64, length: u64) -> Self {
        Self {
            start,
            length,
            owner: Some(owner),
            state: BlockState::Allocated,
        }
    }

    /// One past the last unit of the span
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Check if the block is free
    pub fn is_free(&self) -> bool {
        self.state.is_free()
    }

    /// Release the block back to the free state
    pub(crate) fn release(&mut self) {
        self.owner = None;
        self.state = BlockState::Free;
    }
}

impl fmt::Display for Block {
    /// `[start - end] (STATE) size N [process id]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_free() { "FREE" } else { "FULL" };
        write!(
            f,
            "[{:5} - {:5}] ({}) size {}",
            self.start,
            self.end(),
            state,
            self.length
        )?;
        if let Some(owner) = self.owner {
            write!(f, " process {}", owner)?;
        }
        Ok(())
    }
}
