// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Heap introspection seam.
//!
//! Everything the benchmark knows about the heap comes through
//! [`HeapInspector`]: occupancy snapshots, per-collector counters, and an
//! advisory "collect now" request.

mod scripted;
mod tracked;

pub use scripted::ScriptedInspector;
pub use tracked::{TrackedHeapInspector, TRIM_COLLECTOR};

use crate::types::{CollectorCounters, HeapSnapshot};

/// Read access to heap occupancy and collector activity.
pub trait HeapInspector {
    /// Current heap occupancy. Never fails; an unknown bound is reported as
    /// [`MaxHeap::Unbounded`](crate::types::MaxHeap::Unbounded).
    fn take_snapshot(&mut self) -> HeapSnapshot;

    /// One entry per collector, in a deterministic order.
    fn list_collectors(&mut self) -> Vec<CollectorCounters>;

    /// Ask for memory to be reclaimed now.
    ///
    /// This is a hint. Implementations may defer, coalesce or ignore it, and
    /// callers must not depend on its effect.
    fn request_collection(&mut self);
}

impl<T: HeapInspector + ?Sized> HeapInspector for &mut T {
    fn take_snapshot(&mut self) -> HeapSnapshot {
        (**self).take_snapshot()
    }

    fn list_collectors(&mut self) -> Vec<CollectorCounters> {
        (**self).list_collectors()
    }

    fn request_collection(&mut self) {
        (**self).request_collection()
    }
}
