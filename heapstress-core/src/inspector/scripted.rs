// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Deterministic in-memory inspector.

use std::collections::VecDeque;

use crate::inspector::HeapInspector;
use crate::types::{CollectorCounters, HeapSnapshot, MaxHeap};

/// Inspector that replays fixed sequences of snapshots and collector readings.
///
/// Each call consumes the next scripted entry; once a sequence runs out the
/// last entry is repeated forever.
#[derive(Debug, Clone)]
pub struct ScriptedInspector {
    snapshots: VecDeque<HeapSnapshot>,
    last_snapshot: HeapSnapshot,
    collectors: VecDeque<Vec<CollectorCounters>>,
    last_collectors: Vec<CollectorCounters>,
    snapshots_taken: u64,
    collection_requests: u64,
}

impl ScriptedInspector {
    /// An inspector that reports an empty heap of size `max` and no collectors.
    pub fn new(max: MaxHeap) -> Self {
        Self {
            snapshots: VecDeque::new(),
            last_snapshot: HeapSnapshot::new(0, 0, max),
            collectors: VecDeque::new(),
            last_collectors: Vec::new(),
            snapshots_taken: 0,
            collection_requests: 0,
        }
    }

    /// Queue snapshots built from `(used, committed)` pairs against `max`.
    pub fn with_usage(mut self, max: MaxHeap, usage: impl IntoIterator<Item = (u64, u64)>) -> Self {
        self.snapshots.extend(
            usage
                .into_iter()
                .map(|(used, committed)| HeapSnapshot::new(used, committed, max)),
        );
        self
    }

    /// Queue one collector reading per call to `list_collectors`.
    pub fn with_collectors(
        mut self,
        readings: impl IntoIterator<Item = Vec<CollectorCounters>>,
    ) -> Self {
        self.collectors.extend(readings);
        self
    }

    /// Number of snapshots handed out so far.
    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken
    }

    /// Number of collection requests received so far.
    pub fn collection_requests(&self) -> u64 {
        self.collection_requests
    }
}

impl HeapInspector for ScriptedInspector {
    fn take_snapshot(&mut self) -> HeapSnapshot {
        self.snapshots_taken += 1;
        if let Some(next) = self.snapshots.pop_front() {
            self.last_snapshot = next;
        }
        self.last_snapshot
    }

    fn list_collectors(&mut self) -> Vec<CollectorCounters> {
        if let Some(next) = self.collectors.pop_front() {
            self.last_collectors = next;
        }
        self.last_collectors.clone()
    }

    fn request_collection(&mut self) {
        self.collection_requests += 1;
    }
}
