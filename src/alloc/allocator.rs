//! Partition allocator implementation

use super::block::{Block, BlockId, ProcessId};
use super::policy::PlacementPolicy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info};

/// Recoverable allocator errors
///
/// All three are ordinary result values: the simulation reports them and
/// keeps processing subsequent commands.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free block can satisfy the request, even after one compaction pass.
    /// `available` is the free-unit total at failure time.
    #[error("cannot place {size} units for process {owner}: {available} units free")]
    AllocationFailed {
        owner: ProcessId,
        size: u64,
        available: u64,
    },

    /// Deallocation for a process that holds no block
    #[error("process {owner} holds no allocation")]
    UnknownProcess { owner: ProcessId },

    /// Allocation for a process that already holds a block
    #[error("process {owner} already holds an allocation")]
    DuplicateOwner { owner: ProcessId },
}

/// Sort key for the free index
///
/// `primary` is the block start under first fit and the block length under
/// best/worst fit; `start` breaks length ties toward the lower address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FitKey {
    primary: u64,
    start: u64,
}

/// Allocator over a fixed-size linear address space
///
/// Blocks live in an arena indexed by stable [`BlockId`] handles; the two
/// ordered indices and the owner map store handles only. Every span change
/// goes through remove-old-key / insert-new-key on both indices, so neither
/// ever holds a stale entry.
pub struct MemoryAllocator {
    /// Total units in the address space
    capacity: u64,
    /// Placement policy, fixed at construction
    policy: PlacementPolicy,
    /// Block storage; `None` slots are recyclable
    arena: Vec<Option<Block>>,
    /// Recycled arena slots
    recycled: Vec<BlockId>,
    /// All blocks, ordered by start address
    by_address: BTreeMap<u64, BlockId>,
    /// Free blocks, ordered by the policy's fit key
    free_by_fit: BTreeMap<FitKey, BlockId>,
    /// Allocated block per process
    owner_index: HashMap<ProcessId, BlockId>,
    /// Number of compaction passes performed
    compactions: u64,
}

impl MemoryAllocator {
    /// Create an allocator whose whole space starts as one free block
    ///
    /// `capacity` must be positive; the trace layer validates this before
    /// construction.
    pub fn new(capacity: u64, policy: PlacementPolicy) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        info!(capacity, %policy, "initializing allocator");

        let mut allocator = Self {
            capacity,
            policy,
            arena: Vec::new(),
            recycled: Vec::new(),
            by_address: BTreeMap::new(),
            free_by_fit: BTreeMap::new(),
            owner_index: HashMap::new(),
            compactions: 0,
        };

        let whole = Block::free(0, capacity);
        let id = allocator.insert_block(whole);
        allocator.by_address.insert(whole.start, id);
        let key = allocator.fit_key(&whole);
        allocator.free_by_fit.insert(key, id);

        allocator
    }

    /// Total units in the address space
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Active placement policy
    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// Place `size` units for `owner`
    ///
    /// Runs one compaction pass and retries once if no free block fits;
    /// compaction performed on the failure path is kept. `size` must be
    /// positive (enforced at the trace boundary).
    pub fn allocate(&mut self, owner: ProcessId, size: u64) -> Result<(), AllocError> {
        debug_assert!(size > 0, "allocation size must be positive");
        if self.owner_index.contains_key(&owner) {
            return Err(AllocError::DuplicateOwner { owner });
        }

        let fit = match self.find_fit(size) {
            Some(id) => id,
            None => {
                debug!(%owner, size, "no fit, compacting and retrying");
                self.compact();
                match self.find_fit(size) {
                    Some(id) => id,
                    None => {
                        return Err(AllocError::AllocationFailed {
                            owner,
                            size,
                            available: self.free_units(),
                        });
                    }
                }
            }
        };

        self.split(fit, owner, size);
        Ok(())
    }

    /// Release the block held by `owner`, coalescing with free neighbors
    pub fn deallocate(&mut self, owner: ProcessId) -> Result<(), AllocError> {
        let id = match self.owner_index.remove(&owner) {
            Some(id) => id,
            None => return Err(AllocError::UnknownProcess { owner }),
        };

        let released = *self.block(id);
        self.block_mut(id).release();

        // Address-order neighbors via range queries, never a rescan
        let prev = self
            .by_address
            .range(..released.start)
            .next_back()
            .map(|(_, &p)| p);
        let next = self
            .by_address
            .range(released.start + 1..)
            .next()
            .map(|(_, &n)| n);

        let mut start = released.start;
        let mut length = released.length;

        if let Some(prev_id) = prev {
            if self.block(prev_id).is_free() {
                let absorbed = self.remove_free(prev_id);
                start = absorbed.start;
                length += absorbed.length;
            }
        }
        if let Some(next_id) = next {
            if self.block(next_id).is_free() {
                let absorbed = self.remove_free(next_id);
                length += absorbed.length;
            }
        }

        // Re-key the released block under its merged span
        self.by_address.remove(&released.start);
        let merged = Block::free(start, length);
        *self.block_mut(id) = merged;
        self.by_address.insert(merged.start, id);
        let key = self.fit_key(&merged);
        self.free_by_fit.insert(key, id);

        debug!(%owner, start = merged.start, length = merged.length, "deallocated");
        Ok(())
    }

    /// Slide every allocated block down to close all gaps
    ///
    /// Allocated blocks keep their relative address order; afterwards the
    /// free space is one trailing block (or absent when the space is full).
    /// Compacting an empty space yields one free block over everything.
    pub fn compact(&mut self) {
        let ids: Vec<BlockId> = self.by_address.values().copied().collect();
        self.by_address.clear();
        self.free_by_fit.clear();

        let mut offset = 0u64;
        let mut moved = 0usize;
        for id in ids {
            let block = *self.block(id);
            if block.is_free() {
                self.remove_slot(id);
                continue;
            }
            if block.start != offset {
                moved += 1;
            }
            let relocated = Block { start: offset, ..block };
            *self.block_mut(id) = relocated;
            self.by_address.insert(relocated.start, id);
            offset += relocated.length;
        }

        if offset < self.capacity {
            let tail = Block::free(offset, self.capacity - offset);
            let id = self.insert_block(tail);
            self.by_address.insert(tail.start, id);
            let key = self.fit_key(&tail);
            self.free_by_fit.insert(key, id);
        }

        self.compactions += 1;
        debug!(moved, tail_free = self.capacity - offset, "compacted");
    }

    /// Address-ordered copy of the current block layout
    pub fn snapshot(&self) -> Vec<Block> {
        self.by_address
            .values()
            .map(|&id| *self.block(id))
            .collect()
    }

    /// Occupancy counters for reporting
    pub fn stats(&self) -> AllocatorStats {
        let mut stats = AllocatorStats {
            capacity: self.capacity,
            compactions: self.compactions,
            ..AllocatorStats::default()
        };

        for &id in self.by_address.values() {
            let block = self.block(id);
            if block.is_free() {
                stats.free_blocks += 1;
                stats.free_units += block.length;
                stats.largest_free = stats.largest_free.max(block.length);
            } else {
                stats.allocated_blocks += 1;
                stats.allocated_units += block.length;
            }
        }

        stats
    }

    /// Sum of all free block lengths
    pub fn free_units(&self) -> u64 {
        self.free_by_fit
            .values()
            .map(|&id| self.block(id).length)
            .sum()
    }

    /// Select a free block for `size` under the active policy
    fn find_fit(&self, size: u64) -> Option<BlockId> {
        match self.policy {
            // Free index is address-ordered: walk it until something fits
            PlacementPolicy::First => self
                .free_by_fit
                .values()
                .copied()
                .find(|&id| self.block(id).length >= size),
            // Free index is length-ordered: the first key at or above `size`
            // is the tightest fit, ties already lean to the lower address
            PlacementPolicy::Best => self
                .free_by_fit
                .range(FitKey { primary: size, start: 0 }..)
                .next()
                .map(|(_, &id)| id),
            // Largest block or nothing; no fallback to a smaller one
            PlacementPolicy::Worst => {
                let (&FitKey { primary: largest, .. }, _) = self.free_by_fit.iter().next_back()?;
                if largest < size {
                    return None;
                }
                self.free_by_fit
                    .range(FitKey { primary: largest, start: 0 }..)
                    .next()
                    .map(|(_, &id)| id)
            }
        }
    }

    /// Carve `size` units for `owner` off the front of free block `free_id`
    fn split(&mut self, free_id: BlockId, owner: ProcessId, size: u64) {
        let free = *self.block(free_id);

        // Unindex under the old keys before the span changes
        self.by_address.remove(&free.start);
        let old_key = self.fit_key(&free);
        self.free_by_fit.remove(&old_key);

        let allocated = Block::allocated(owner, free.start, size);
        let alloc_id = self.insert_block(allocated);
        self.by_address.insert(allocated.start, alloc_id);
        self.owner_index.insert(owner, alloc_id);

        let remainder = free.length - size;
        if remainder > 0 {
            let rest = Block::free(free.start + size, remainder);
            *self.block_mut(free_id) = rest;
            self.by_address.insert(rest.start, free_id);
            let key = self.fit_key(&rest);
            self.free_by_fit.insert(key, free_id);
        } else {
            // Exact fit consumes the free block entirely
            self.remove_slot(free_id);
        }

        debug!(%owner, start = allocated.start, size, remainder, "allocated");
    }

    /// Drop a free block from both indices and the arena, returning its span
    fn remove_free(&mut self, id: BlockId) -> Block {
        let block = *self.block(id);
        self.by_address.remove(&block.start);
        let key = self.fit_key(&block);
        self.free_by_fit.remove(&key);
        self.remove_slot(id);
        block
    }

    fn fit_key(&self, block: &Block) -> FitKey {
        let primary = if self.policy.keys_by_size() {
            block.length
        } else {
            block.start
        };
        FitKey {
            primary,
            start: block.start,
        }
    }

    fn insert_block(&mut self, block: Block) -> BlockId {
        match self.recycled.pop() {
            Some(id) => {
                self.arena[id.index()] = Some(block);
                id
            }
            None => {
                let id = BlockId(self.arena.len() as u32);
                self.arena.push(Some(block));
                id
            }
        }
    }

    fn remove_slot(&mut self, id: BlockId) {
        self.arena[id.index()] = None;
        self.recycled.push(id);
    }

    fn block(&self, id: BlockId) -> &Block {
        self.arena[id.index()].as_ref().expect("stale block handle")
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.arena[id.index()].as_mut().expect("stale block handle")
    }
}

/// Occupancy counters for the allocator
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AllocatorStats {
    pub capacity: u64,
    pub allocated_blocks: usize,
    pub free_blocks: usize,
    pub allocated_units: u64,
    pub free_units: u64,
    pub largest_free: u64,
    pub compactions: u64,
}
