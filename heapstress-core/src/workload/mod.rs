// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Allocation workloads.
//!
//! All three workloads share one loop, parameterized by a [`WorkloadSpec`]:
//!
//! 1. Check the pressure controller against a fresh snapshot and, if it
//!    signals relief, drop every retained block and request a collection.
//! 2. Allocate one block sized by the [`SizePolicy`] and retain it.
//! 3. Apply the [`Retention`] policy.
//! 4. Every `report_every` iterations emit a progress snapshot.
//!
//! After the loop the buffer is released, a final collection is requested
//! and a phase-end snapshot is emitted. A refused allocation ends the loop
//! early with a snapshot read while the buffer is still live.

mod buffer;

pub use buffer::{AllocationFailed, Block, BlockAllocator, HeapBlocks, WorkloadBuffer};

use std::fmt;
use std::time::{Duration, Instant};

use rand::{Rng, RngCore};
use serde::Serialize;

use crate::error::{BenchError, BenchResult};
use crate::events::{BenchEvent, EventSink};
use crate::inspector::HeapInspector;
use crate::pressure::PressureController;
use crate::types::{HeapSnapshot, KIB, MIB};

/// Base iteration count of the small-object workload.
pub const ALLOCATION_SIZE: u64 = 500_000;

/// The three benchmark phases, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    SmallObjects,
    LargeObjects,
    MixedObjects,
}

impl Phase {
    /// 1-based position of the phase in a run.
    pub const fn number(&self) -> u8 {
        match self {
            Self::SmallObjects => 1,
            Self::LargeObjects => 2,
            Self::MixedObjects => 3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallObjects => write!(f, "small-object"),
            Self::LargeObjects => write!(f, "large-object"),
            Self::MixedObjects => write!(f, "mixed"),
        }
    }
}

/// How big each allocated block is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePolicy {
    /// Every block has the same size.
    Fixed { bytes: usize },
    /// `small` with probability `small_probability`, otherwise `large`.
    Bimodal {
        small: usize,
        large: usize,
        small_probability: f64,
    },
}

impl SizePolicy {
    /// Size of the next block. Fixed sizes never draw from `rng`.
    pub fn next_size(&self, rng: &mut dyn RngCore) -> usize {
        match *self {
            Self::Fixed { bytes } => bytes,
            Self::Bimodal {
                small,
                large,
                small_probability,
            } => {
                if rng.gen_bool(small_probability) {
                    small
                } else {
                    large
                }
            }
        }
    }
}

/// Which blocks die outside of pressure relief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// At every reporting checkpoint drop the oldest half of the buffer.
    HalveAtCheckpoint,
    /// On every even iteration drop the single oldest block, so the block
    /// just added at iteration 0 dies immediately.
    DropOldestEveryOther,
}

/// Parameters of one workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadSpec {
    pub phase: Phase,
    pub iterations: u64,
    pub report_every: u64,
    pub sizes: SizePolicy,
    pub retention: Retention,
}

impl WorkloadSpec {
    /// Many 1 KiB blocks retained between relief events.
    pub fn small_objects() -> Self {
        Self {
            phase: Phase::SmallObjects,
            iterations: ALLOCATION_SIZE,
            report_every: 5_000,
            sizes: SizePolicy::Fixed {
                bytes: KIB as usize,
            },
            retention: Retention::HalveAtCheckpoint,
        }
    }

    /// A handful of 1 MiB blocks with the oldest replaced every other iteration.
    pub fn large_objects() -> Self {
        Self {
            phase: Phase::LargeObjects,
            iterations: 5,
            report_every: 1,
            sizes: SizePolicy::Fixed {
                bytes: MIB as usize,
            },
            retention: Retention::DropOldestEveryOther,
        }
    }

    /// Mostly 512 B blocks with a 10% share of 100 KiB blocks.
    pub fn mixed() -> Self {
        Self {
            phase: Phase::MixedObjects,
            iterations: ALLOCATION_SIZE / 2,
            report_every: 5_000,
            sizes: SizePolicy::Bimodal {
                small: 512,
                large: 100 * KIB as usize,
                small_probability: 0.9,
            },
            retention: Retention::HalveAtCheckpoint,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_report_every(mut self, report_every: u64) -> Self {
        self.report_every = report_every;
        self
    }
}

/// Everything a workload touches while it runs.
pub struct PhaseContext<'a> {
    pub inspector: &'a mut dyn HeapInspector,
    pub allocator: &'a mut dyn BlockAllocator,
    pub rng: &'a mut dyn RngCore,
    pub sink: &'a mut dyn EventSink,
    pub pressure: PressureController,
}

/// What a completed workload did.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub iterations: u64,
    pub allocated_bytes: u64,
    pub reliefs: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub end_snapshot: HeapSnapshot,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl AllocationFailed {
    fn in_phase(self, phase: Phase, iteration: u64, snapshot: HeapSnapshot) -> BenchError {
        BenchError::OutOfMemory {
            phase,
            iteration,
            requested_bytes: self.requested_bytes,
            snapshot,
        }
    }
}

/// Run one workload to completion.
///
/// The only error is [`BenchError::OutOfMemory`], returned unchanged the
/// moment an allocation is refused.
pub fn run_workload(spec: &WorkloadSpec, ctx: &mut PhaseContext<'_>) -> BenchResult<PhaseOutcome> {
    let phase = spec.phase;
    let report_every = spec.report_every.max(1);
    let start = Instant::now();
    let mut buffer = WorkloadBuffer::new();
    let mut allocated_bytes = 0u64;
    let mut reliefs = 0u64;

    tracing::info!(
        phase = %phase,
        iterations = spec.iterations,
        report_every,
        "Starting workload"
    );
    ctx.sink.emit(BenchEvent::PhaseStarted {
        phase,
        iterations: spec.iterations,
    });

    for iteration in 0..spec.iterations {
        let snapshot = ctx.inspector.take_snapshot();
        if ctx.pressure.should_relieve(&snapshot) {
            let released_blocks = buffer.release_all();
            ctx.inspector.request_collection();
            reliefs += 1;

            tracing::debug!(
                phase = %phase,
                iteration,
                released_blocks,
                used_bytes = snapshot.used_bytes(),
                "Pressure relief"
            );
            ctx.sink.emit(BenchEvent::Relief {
                phase,
                iteration,
                released_blocks,
                snapshot,
            });
        }

        let size = spec.sizes.next_size(ctx.rng);
        let stored = ctx
            .allocator
            .allocate(size)
            .and_then(|block| buffer.push(block));
        if let Err(failed) = stored {
            // Read the heap before `buffer` is dropped on the way out.
            let snapshot = ctx.inspector.take_snapshot();
            return Err(failed.in_phase(phase, iteration, snapshot));
        }
        allocated_bytes += size as u64;

        let checkpoint = iteration % report_every == 0;
        match spec.retention {
            Retention::HalveAtCheckpoint if checkpoint => {
                buffer.release_oldest_half();
            }
            Retention::DropOldestEveryOther if iteration % 2 == 0 => {
                buffer.release_oldest(1);
            }
            _ => {}
        }

        if checkpoint {
            ctx.sink.emit(BenchEvent::Progress {
                phase,
                iteration,
                retained_blocks: buffer.len(),
                retained_bytes: buffer.retained_bytes(),
                snapshot: ctx.inspector.take_snapshot(),
            });
        }
    }

    buffer.release_all();
    drop(buffer);
    ctx.inspector.request_collection();

    let end_snapshot = ctx.inspector.take_snapshot();
    let elapsed = start.elapsed();
    ctx.sink.emit(BenchEvent::PhaseFinished {
        phase,
        elapsed,
        snapshot: end_snapshot,
    });
    tracing::info!(
        phase = %phase,
        elapsed_ms = elapsed.as_millis() as u64,
        reliefs,
        "Workload finished"
    );

    Ok(PhaseOutcome {
        phase,
        iterations: spec.iterations,
        allocated_bytes,
        reliefs,
        elapsed,
        end_snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::ScriptedInspector;
    use crate::types::MaxHeap;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Allocator that hands out empty blocks and records requested sizes.
    #[derive(Default)]
    struct RecordingBlocks {
        sizes: Vec<usize>,
        fail_at: Option<usize>,
    }

    impl BlockAllocator for RecordingBlocks {
        fn allocate(&mut self, size: usize) -> Result<Block, AllocationFailed> {
            if self.fail_at == Some(self.sizes.len()) {
                return Err(AllocationFailed {
                    requested_bytes: size,
                });
            }
            self.sizes.push(size);
            HeapBlocks.allocate(size.min(8))
        }
    }

    fn run(
        spec: &WorkloadSpec,
        inspector: &mut ScriptedInspector,
        blocks: &mut RecordingBlocks,
    ) -> (BenchResult<PhaseOutcome>, Vec<BenchEvent>) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut events = Vec::new();
        let mut ctx = PhaseContext {
            inspector,
            allocator: blocks,
            rng: &mut rng,
            sink: &mut events,
            pressure: PressureController::default(),
        };
        let result = run_workload(spec, &mut ctx);
        (result, events)
    }

    fn progress_iterations(events: &[BenchEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                BenchEvent::Progress { iteration, .. } => Some(*iteration),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_small_objects_progress_cadence() {
        let spec = WorkloadSpec::small_objects().with_iterations(10_000);
        let mut inspector = ScriptedInspector::new(MaxHeap::Unbounded);
        let mut blocks = RecordingBlocks::default();

        let (result, events) = run(&spec, &mut inspector, &mut blocks);
        let outcome = result.unwrap();

        assert_eq!(progress_iterations(&events), vec![0, 5_000]);
        assert!(matches!(events.last(), Some(BenchEvent::PhaseFinished { .. })));
        let finished_at = events
            .iter()
            .position(|e| matches!(e, BenchEvent::PhaseFinished { .. }))
            .unwrap();
        assert_eq!(finished_at, events.len() - 1);

        assert_eq!(outcome.iterations, 10_000);
        assert_eq!(outcome.allocated_bytes, 10_000 * 1024);
        assert_eq!(outcome.reliefs, 0);
        assert!(blocks.sizes.iter().all(|&s| s == 1024));
    }

    #[test]
    fn test_large_objects_report_every_iteration() {
        let spec = WorkloadSpec::large_objects();
        let mut inspector = ScriptedInspector::new(MaxHeap::Unbounded);
        let mut blocks = RecordingBlocks::default();

        let (result, events) = run(&spec, &mut inspector, &mut blocks);
        result.unwrap();

        assert_eq!(progress_iterations(&events), vec![0, 1, 2, 3, 4]);
        let retained: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                BenchEvent::Progress {
                    retained_blocks, ..
                } => Some(*retained_blocks),
                _ => None,
            })
            .collect();
        assert_eq!(retained, vec![0, 1, 1, 2, 2]);
        assert_eq!(blocks.sizes, vec![MIB as usize; 5]);
    }

    #[test]
    fn test_relief_releases_and_requests_collection() {
        let max = MaxHeap::Bounded(100);
        let spec = WorkloadSpec::small_objects()
            .with_iterations(4)
            .with_report_every(1_000);
        // Per iteration: one pressure check. Progress adds one read at iteration 0.
        let mut inspector = ScriptedInspector::new(max).with_usage(
            max,
            [(10, 10), (10, 10), (80, 80), (10, 10), (10, 10), (10, 10)],
        );
        let mut blocks = RecordingBlocks::default();

        let (result, events) = run(&spec, &mut inspector, &mut blocks);
        let outcome = result.unwrap();

        let reliefs: Vec<(u64, usize)> = events
            .iter()
            .filter_map(|e| match e {
                BenchEvent::Relief {
                    iteration,
                    released_blocks,
                    ..
                } => Some((*iteration, *released_blocks)),
                _ => None,
            })
            .collect();
        assert_eq!(reliefs, vec![(1, 1)]);
        assert_eq!(outcome.reliefs, 1);
        // One for the relief, one at phase end.
        assert_eq!(inspector.collection_requests(), 2);
    }

    #[test]
    fn test_unbounded_heap_never_relieves() {
        let spec = WorkloadSpec::small_objects().with_iterations(50);
        let mut inspector = ScriptedInspector::new(MaxHeap::Unbounded)
            .with_usage(MaxHeap::Unbounded, [(u64::MAX, u64::MAX)]);
        let mut blocks = RecordingBlocks::default();

        let (result, events) = run(&spec, &mut inspector, &mut blocks);
        assert_eq!(result.unwrap().reliefs, 0);
        assert!(!events.iter().any(|e| matches!(e, BenchEvent::Relief { .. })));
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let spec = WorkloadSpec::small_objects().with_iterations(100);
        // Each reading reports its own sequence number as used bytes.
        let mut inspector = ScriptedInspector::new(MaxHeap::Unbounded)
            .with_usage(MaxHeap::Unbounded, (1..=100).map(|n| (n, n)));
        let mut blocks = RecordingBlocks {
            fail_at: Some(10),
            ..Default::default()
        };

        let (result, events) = run(&spec, &mut inspector, &mut blocks);
        match result {
            Err(BenchError::OutOfMemory {
                phase,
                iteration,
                requested_bytes,
                snapshot,
            }) => {
                assert_eq!(phase, Phase::SmallObjects);
                assert_eq!(iteration, 10);
                assert_eq!(requested_bytes, 1024);
                // Eleven pressure checks, one progress read at iteration 0,
                // then the reading taken at the refusal itself.
                assert_eq!(snapshot.used_bytes(), 13);
                assert_eq!(inspector.snapshots_taken(), 13);
            }
            other => panic!("expected OutOfMemory, got {:?}", other),
        }
        assert!(!events
            .iter()
            .any(|e| matches!(e, BenchEvent::PhaseFinished { .. })));
    }

    #[test]
    fn test_mixed_size_distribution() {
        let policy = WorkloadSpec::mixed().sizes;
        let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
        let draws = 100_000;
        let small = (0..draws)
            .filter(|_| policy.next_size(&mut rng) == 512)
            .count();
        let fraction = small as f64 / draws as f64;
        assert!((fraction - 0.9).abs() < 0.01, "fraction = {}", fraction);
    }

    #[test]
    fn test_mixed_sizes_are_bimodal() {
        let spec = WorkloadSpec::mixed().with_iterations(2_000);
        let mut inspector = ScriptedInspector::new(MaxHeap::Unbounded);
        let mut blocks = RecordingBlocks::default();

        let (result, _) = run(&spec, &mut inspector, &mut blocks);
        result.unwrap();
        assert!(blocks.sizes.iter().all(|&s| s == 512 || s == 100 * 1024));
        assert!(blocks.sizes.contains(&512));
        assert!(blocks.sizes.contains(&(100 * 1024)));
    }

    #[test]
    fn test_phase_numbers_and_names() {
        assert_eq!(Phase::SmallObjects.number(), 1);
        assert_eq!(Phase::LargeObjects.number(), 2);
        assert_eq!(Phase::MixedObjects.number(), 3);
        assert_eq!(Phase::MixedObjects.to_string(), "mixed");
    }
}
