// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! heapstress core library
//!
//! Drives the process heap through controlled allocation workloads while
//! sampling heap occupancy and collector activity:
//!
//! - **Small objects**: many 1 KiB blocks, half of them dying at each checkpoint
//! - **Large objects**: a few 1 MiB blocks with the oldest periodically replaced
//! - **Mixed**: a 90/10 split of 512 B and 100 KiB blocks
//!
//! Heap readings come from [`TrackingAllocator`], which must be installed as
//! the global allocator of the binary running the benchmark.

pub mod allocator;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod inspector;
pub mod orchestrator;
pub mod pressure;
pub mod reporter;
pub mod state;
pub mod types;
pub mod workload;

// Re-export commonly used types
pub use allocator::TrackingAllocator;
pub use config::{BenchConfig, ConfigLoader};
pub use error::{BenchError, BenchResult, StateTransitionError, ValidationError};
pub use events::{BenchEvent, ConsoleSink, EventSink};
pub use host::SystemInfo;
pub use inspector::{HeapInspector, ScriptedInspector, TrackedHeapInspector};
pub use orchestrator::{BenchmarkRun, Orchestrator, RunOutcome, OOM_LABEL};
pub use pressure::PressureController;
pub use reporter::{JsonReporter, RunSummary};
pub use state::{RunState, RunStateMachine};
pub use types::{CollectorCounters, CollectorDelta, HeapLimit, HeapSnapshot, MaxHeap};
pub use workload::{Phase, WorkloadSpec};
