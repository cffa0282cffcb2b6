// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Exhausts a real heap limit and checks the run fails cleanly.

use heapstress_core::allocator;
use heapstress_core::{
    BenchError, BenchEvent, ConfigLoader, HeapSnapshot, MaxHeap, Orchestrator, Phase, RunState,
    TrackedHeapInspector, TrackingAllocator, OOM_LABEL,
};

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

const MIB: u64 = 1024 * 1024;

// A threshold of 1.0 never fires because used never exceeds max, so the
// large phase keeps growing until the limit refuses a block.
const EXHAUSTING_CONFIG: &str = r#"
heap_limit: unbounded
relief_threshold: 1.0
settle_ms: 0
seed: 3
small:
  iterations: 100
  report_every: 50
large:
  iterations: 64
  block_bytes: 4194304
mixed:
  iterations: 100
  report_every: 50
"#;

#[test]
fn test_real_exhaustion_reports_once_and_fails() {
    let config = ConfigLoader::load_string(EXHAUSTING_CONFIG).expect("Config should be valid");

    // Off a block boundary, so a refused block always leaves room for the
    // small bookkeeping allocations that follow.
    let limit = allocator::heap_totals().used_bytes + 50 * MIB;
    let inspector = TrackedHeapInspector::new(MaxHeap::Bounded(limit));
    let mut orchestrator = Orchestrator::new(&config, inspector, Vec::new());

    let result = orchestrator.run();
    allocator::set_heap_limit(MaxHeap::Unbounded);

    let failure = match result {
        Err(BenchError::OutOfMemory {
            phase,
            requested_bytes,
            snapshot,
            ..
        }) => {
            assert_eq!(phase, Phase::LargeObjects);
            assert!(requested_bytes > 0);
            snapshot
        }
        other => panic!("expected OutOfMemory, got {:?}", other.map(|o| o.phases.len())),
    };

    // The blocks the large phase was holding are still counted: usage sits
    // within two blocks of the limit.
    assert_eq!(failure.max(), MaxHeap::Bounded(limit));
    assert!(
        failure.used_bytes() + 8 * MIB >= limit,
        "used {} of {}",
        failure.used_bytes(),
        limit
    );
    assert!(failure.usage_ratio().unwrap_or(0.0) > 0.8);
    assert!(allocator::refused_allocations() >= 1);
    assert_eq!(orchestrator.state(), RunState::Failed);

    let oom_snapshots: Vec<HeapSnapshot> = orchestrator
        .sink()
        .iter()
        .filter_map(|e| match e {
            BenchEvent::Snapshot { label, snapshot } if label == OOM_LABEL => Some(*snapshot),
            _ => None,
        })
        .collect();
    assert_eq!(oom_snapshots, vec![failure]);

    // Phase 1 completed, phase 2 never did.
    let labels: Vec<_> = orchestrator.sink().iter().filter_map(|e| e.label()).collect();
    assert!(labels.contains(&"After Phase 1"));
    assert!(!labels.contains(&"After Phase 2"));
}
