// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Live-block storage for a running workload.

use std::collections::VecDeque;

/// Byte written into every block so its pages are actually committed.
const FILL_BYTE: u8 = 0xA5;

/// An opaque allocated block standing in for a live object.
#[derive(Debug)]
pub struct Block {
    bytes: Vec<u8>,
}

impl Block {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An allocation the heap refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationFailed {
    pub requested_bytes: usize,
}

/// Source of blocks for the workloads.
pub trait BlockAllocator {
    /// Allocate a block of exactly `size` bytes, or report that the heap refused.
    fn allocate(&mut self, size: usize) -> Result<Block, AllocationFailed>;
}

/// Allocates blocks on the process heap with fallible reservation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapBlocks;

impl BlockAllocator for HeapBlocks {
    fn allocate(&mut self, size: usize) -> Result<Block, AllocationFailed> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| AllocationFailed {
                requested_bytes: size,
            })?;
        bytes.resize(size, FILL_BYTE);
        Ok(Block { bytes })
    }
}

/// Ordered sequence of live blocks, oldest first.
///
/// Owned by exactly one workload for the duration of its phase.
#[derive(Debug, Default)]
pub struct WorkloadBuffer {
    blocks: VecDeque<Block>,
    retained_bytes: u64,
}

impl WorkloadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block as the newest entry.
    pub fn push(&mut self, block: Block) -> Result<(), AllocationFailed> {
        self.blocks
            .try_reserve(1)
            .map_err(|_| AllocationFailed {
                requested_bytes: std::mem::size_of::<Block>(),
            })?;
        self.retained_bytes += block.len() as u64;
        self.blocks.push_back(block);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total payload bytes of the retained blocks.
    pub fn retained_bytes(&self) -> u64 {
        self.retained_bytes
    }

    /// Drop up to `count` of the oldest blocks. Returns how many were dropped.
    pub fn release_oldest(&mut self, count: usize) -> usize {
        let count = count.min(self.blocks.len());
        for block in self.blocks.drain(..count) {
            self.retained_bytes -= block.len() as u64;
        }
        count
    }

    /// Drop the oldest half of the blocks (rounded down).
    pub fn release_oldest_half(&mut self) -> usize {
        self.release_oldest(self.blocks.len() / 2)
    }

    /// Drop every block.
    pub fn release_all(&mut self) -> usize {
        let count = self.blocks.len();
        self.blocks.clear();
        self.retained_bytes = 0;
        count
    }
}
