// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Progress events emitted while a run is in flight.

use std::io::Write;
use std::time::Duration;

use crate::reporter;
use crate::types::HeapSnapshot;
use crate::workload::Phase;

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchEvent {
    /// A labeled memory-status block ("Initial", "After Phase 1", "At OOM").
    Snapshot {
        label: String,
        snapshot: HeapSnapshot,
    },
    PhaseStarted {
        phase: Phase,
        iterations: u64,
    },
    /// The pressure controller fired and the buffer was dropped.
    Relief {
        phase: Phase,
        iteration: u64,
        released_blocks: usize,
        snapshot: HeapSnapshot,
    },
    /// Periodic checkpoint inside a workload.
    Progress {
        phase: Phase,
        iteration: u64,
        retained_blocks: usize,
        retained_bytes: u64,
        snapshot: HeapSnapshot,
    },
    PhaseFinished {
        phase: Phase,
        elapsed: Duration,
        snapshot: HeapSnapshot,
    },
}

impl BenchEvent {
    /// The label of a [`BenchEvent::Snapshot`], if this is one.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Snapshot { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// Receiver of progress events.
pub trait EventSink {
    fn emit(&mut self, event: BenchEvent);
}

/// Collects events in memory.
impl EventSink for Vec<BenchEvent> {
    fn emit(&mut self, event: BenchEvent) {
        self.push(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: BenchEvent) {
        (**self).emit(event);
    }
}

/// Prints every event to a writer (stdout by default) as a line-oriented log.
pub struct ConsoleSink<W: Write = std::io::Stdout> {
    out: W,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for ConsoleSink<W> {
    fn emit(&mut self, event: BenchEvent) {
        let text = match &event {
            BenchEvent::Snapshot { label, snapshot } => reporter::format_snapshot(label, snapshot),
            BenchEvent::PhaseStarted { phase, iterations } => {
                reporter::format_phase_start(*phase, *iterations)
            }
            BenchEvent::Relief {
                iteration,
                released_blocks,
                snapshot,
                ..
            } => reporter::format_relief(*iteration, *released_blocks, snapshot),
            BenchEvent::Progress {
                iteration,
                retained_blocks,
                retained_bytes,
                snapshot,
                ..
            } => reporter::format_progress(*iteration, *retained_blocks, *retained_bytes, snapshot),
            BenchEvent::PhaseFinished {
                phase,
                elapsed,
                snapshot,
            } => reporter::format_phase_end(*phase, *elapsed, snapshot),
        };

        // Log output failures are not part of the benchmark's failure model.
        let _ = writeln!(self.out, "{}", text);
    }
}
