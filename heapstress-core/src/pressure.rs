// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Pressure relief policy shared by every workload.

use crate::types::{HeapSnapshot, MaxHeap};

/// Default relief threshold: relieve once more than 70% of the bound is used.
pub const DEFAULT_RELIEF_THRESHOLD: f64 = 0.70;

/// Decides when a workload should drop its retained blocks and ask for a
/// collection before the allocator is forced to refuse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureController {
    threshold: f64,
}

impl PressureController {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True iff the heap is bounded and `used / max` is strictly above the threshold.
    pub fn should_relieve(&self, snapshot: &HeapSnapshot) -> bool {
        match snapshot.max() {
            MaxHeap::Bounded(max) if max > 0 => {
                snapshot.used_bytes() as f64 / max as f64 > self.threshold
            }
            _ => false,
        }
    }
}

impl Default for PressureController {
    fn default() -> Self {
        Self::new(DEFAULT_RELIEF_THRESHOLD)
    }
}
