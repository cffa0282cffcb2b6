// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark orchestrator.
//!
//! Runs the three workloads strictly in order on the calling thread. Between
//! phases it requests a collection, waits a fixed settle pause and emits an
//! "After Phase N" snapshot. An out-of-memory failure emits one "At OOM"
//! snapshot, moves the run to `Failed` and is returned to the caller.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::config::BenchConfig;
use crate::error::BenchResult;
use crate::events::{BenchEvent, EventSink};
use crate::inspector::HeapInspector;
use crate::pressure::PressureController;
use crate::state::{RunState, RunStateMachine};
use crate::types::{CollectorCounters, CollectorDelta, HeapSnapshot};
use crate::workload::{
    run_workload, BlockAllocator, HeapBlocks, PhaseContext, PhaseOutcome, WorkloadSpec,
};

/// Label of the snapshot emitted when a phase runs out of memory.
pub const OOM_LABEL: &str = "At OOM";

/// Start time and collector baseline of one invocation.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    started_at: DateTime<Utc>,
    start: Instant,
    baseline: BTreeMap<String, CollectorCounters>,
}

impl BenchmarkRun {
    /// Record the start time and the baseline of every collector.
    pub fn begin<I: HeapInspector + ?Sized>(inspector: &mut I) -> Self {
        let baseline = inspector
            .list_collectors()
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        Self {
            started_at: Utc::now(),
            start: Instant::now(),
            baseline,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn baseline(&self) -> &BTreeMap<String, CollectorCounters> {
        &self.baseline
    }

    /// One delta per entry of `final_counters`, in the same order.
    pub fn collector_deltas(&self, final_counters: &[CollectorCounters]) -> Vec<CollectorDelta> {
        final_counters
            .iter()
            .map(|c| c.delta_since(self.baseline.get(&c.name)))
            .collect()
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: BenchmarkRun,
    pub phases: Vec<PhaseOutcome>,
    pub final_collectors: Vec<CollectorCounters>,
    /// Heap after the last phase and its collection.
    pub final_snapshot: HeapSnapshot,
    /// Wall time from the baseline to the end of the last phase.
    pub elapsed: Duration,
}

/// Sequences the workloads against one inspector and event sink.
pub struct Orchestrator<I, S> {
    workloads: [WorkloadSpec; 3],
    pressure: PressureController,
    settle: Duration,
    inspector: I,
    sink: S,
    allocator: Box<dyn BlockAllocator>,
    rng: Box<dyn RngCore>,
    machine: RunStateMachine,
}

impl<I: HeapInspector, S: EventSink> Orchestrator<I, S> {
    /// Orchestrator with heap-backed blocks and the configured random source.
    pub fn new(config: &BenchConfig, inspector: I, sink: S) -> Self {
        Self {
            workloads: config.workloads(),
            pressure: config.pressure(),
            settle: config.settle,
            inspector,
            sink,
            allocator: Box::new(HeapBlocks),
            rng: config.rng(),
            machine: RunStateMachine::new(),
        }
    }

    /// Replace the block allocator.
    pub fn with_allocator(mut self, allocator: impl BlockAllocator + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Replace the random source of the mixed workload.
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn state(&self) -> RunState {
        self.machine.state()
    }

    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (I, S) {
        (self.inspector, self.sink)
    }

    /// Run every phase to completion.
    ///
    /// Returns [`BenchError::OutOfMemory`](crate::BenchError::OutOfMemory)
    /// unchanged if a workload exhausts the heap.
    pub fn run(&mut self) -> BenchResult<RunOutcome> {
        let run = BenchmarkRun::begin(&mut self.inspector);
        tracing::info!(
            collectors = run.baseline().len(),
            relief_threshold = self.pressure.threshold(),
            settle_ms = self.settle.as_millis() as u64,
            "Benchmark run started"
        );
        self.emit_snapshot("Initial".to_string());

        let mut phases = Vec::with_capacity(self.workloads.len());
        for spec in self.workloads.clone() {
            self.machine.transition_to(RunState::for_phase(spec.phase))?;

            let outcome = match self.run_phase(&spec) {
                Ok(outcome) => outcome,
                Err(err) => {
                    if let Some(snapshot) = err.oom_snapshot() {
                        tracing::error!(
                            error = %err,
                            used_bytes = snapshot.used_bytes(),
                            "Heap exhausted"
                        );
                        self.sink.emit(BenchEvent::Snapshot {
                            label: OOM_LABEL.to_string(),
                            snapshot,
                        });
                    }
                    self.machine.transition_to(RunState::Failed)?;
                    return Err(err);
                }
            };
            phases.push(outcome);

            self.inspector.request_collection();
            if !self.settle.is_zero() {
                std::thread::sleep(self.settle);
            }
            self.emit_snapshot(format!("After Phase {}", spec.phase.number()));
        }

        let elapsed = run.elapsed();
        self.machine.transition_to(RunState::Done)?;
        let final_collectors = self.inspector.list_collectors();
        let final_snapshot = self.inspector.take_snapshot();
        tracing::info!(
            elapsed_ms = elapsed.as_millis() as u64,
            used_bytes = final_snapshot.used_bytes(),
            "Benchmark run finished"
        );

        Ok(RunOutcome {
            run,
            phases,
            final_collectors,
            final_snapshot,
            elapsed,
        })
    }

    fn run_phase(&mut self, spec: &WorkloadSpec) -> BenchResult<PhaseOutcome> {
        let mut ctx = PhaseContext {
            inspector: &mut self.inspector,
            allocator: self.allocator.as_mut(),
            rng: self.rng.as_mut(),
            sink: &mut self.sink,
            pressure: self.pressure,
        };
        run_workload(spec, &mut ctx)
    }

    fn emit_snapshot(&mut self, label: String) {
        let snapshot = self.inspector.take_snapshot();
        self.sink.emit(BenchEvent::Snapshot { label, snapshot });
    }
}
