// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Human-readable report formatting and JSON summary output.
//!
//! The text functions are pure: they turn snapshots and counters into
//! strings and make no decisions. Byte sizes are always rendered in MiB with
//! two decimals.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::host::SystemInfo;
use crate::orchestrator::RunOutcome;
use crate::types::{CollectorCounters, CollectorDelta, HeapSnapshot, MaxHeap, MIB};
use crate::workload::{Phase, PhaseOutcome};

/// Render a byte count as mebibytes with two decimals.
pub fn format_mib(bytes: u64) -> String {
    format!("{:.2} MiB", bytes as f64 / MIB as f64)
}

fn format_max(max: MaxHeap) -> String {
    match max {
        MaxHeap::Bounded(bytes) => format_mib(bytes),
        MaxHeap::Unbounded => "unbounded".to_string(),
    }
}

/// Labeled memory-status block.
pub fn format_snapshot(label: &str, snapshot: &HeapSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Memory status: {} ---", label);
    let _ = writeln!(out, "  Used:      {}", format_mib(snapshot.used_bytes()));
    let _ = writeln!(out, "  Committed: {}", format_mib(snapshot.committed_bytes()));
    let _ = write!(out, "  Max:       {}", format_max(snapshot.max()));
    if let Some(free) = snapshot.free_bytes() {
        let _ = write!(out, "\n  Free:      {}", format_mib(free));
    }
    if let Some(ratio) = snapshot.usage_ratio() {
        let _ = write!(out, "\n  Usage:     {:.2}%", ratio * 100.0);
    }
    out
}

pub fn format_phase_start(phase: Phase, iterations: u64) -> String {
    format!(
        "\n=== Phase {}: {} allocations ({} iterations) ===",
        phase.number(),
        phase,
        iterations
    )
}

pub fn format_progress(
    iteration: u64,
    retained_blocks: usize,
    retained_bytes: u64,
    snapshot: &HeapSnapshot,
) -> String {
    format!(
        "  [{:>7}] retained {} blocks ({}), heap used {} / committed {}",
        iteration,
        retained_blocks,
        format_mib(retained_bytes),
        format_mib(snapshot.used_bytes()),
        format_mib(snapshot.committed_bytes())
    )
}

pub fn format_relief(iteration: u64, released_blocks: usize, snapshot: &HeapSnapshot) -> String {
    format!(
        "  [{:>7}] pressure relief: released {} blocks at {} of {}",
        iteration,
        released_blocks,
        format_mib(snapshot.used_bytes()),
        format_max(snapshot.max())
    )
}

pub fn format_phase_end(phase: Phase, elapsed: Duration, snapshot: &HeapSnapshot) -> String {
    format!(
        "  Phase {} ({}) finished in {:.2}s, heap used {}",
        phase.number(),
        phase,
        elapsed.as_secs_f64(),
        format_mib(snapshot.used_bytes())
    )
}

/// Label of the memory-status block closing the final report.
pub const FINAL_STATUS_LABEL: &str = "Final Status";

/// Host, allocator and collector identification printed before the first phase.
pub fn format_banner(
    info: &SystemInfo,
    max: MaxHeap,
    collectors: &[CollectorCounters],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "heapstress {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "==========================");
    let _ = writeln!(out, "Host:      {}", info.hostname);
    let _ = writeln!(
        out,
        "OS:        {} {} (kernel {})",
        info.os,
        info.os_version,
        info.kernel_version.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(out, "CPU:       {} ({} cores)", info.cpu_model, info.cpu_cores);
    let _ = writeln!(out, "Memory:    {}", format_mib(info.memory_bytes));
    let _ = writeln!(out, "Allocator: {}", info.allocator);
    if collectors.is_empty() {
        let _ = writeln!(out, "Collector: (none)");
    } else {
        let names: Vec<&str> = collectors.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(out, "Collector: {}", names.join(", "));
    }
    let _ = write!(out, "Heap max:  {}", format_max(max));
    out
}

/// Per-collector deltas since the run's baseline, closed by the final
/// memory status.
pub fn format_final_report(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Final Report ===");
    let _ = writeln!(out, "Total time: {:.2}s", outcome.elapsed.as_secs_f64());
    let _ = write!(out, "Collectors:");

    let deltas = outcome.run.collector_deltas(&outcome.final_collectors);
    if deltas.is_empty() {
        let _ = write!(out, "\n  (no collectors reported)");
    }
    for delta in &deltas {
        write_delta(&mut out, delta);
    }

    let _ = write!(
        out,
        "\n\n{}",
        format_snapshot(FINAL_STATUS_LABEL, &outcome.final_snapshot)
    );
    out
}

fn write_delta(out: &mut String, delta: &CollectorDelta) {
    let _ = write!(out, "\n  {}", delta.name);
    let _ = write!(out, "\n    Collections: {}", delta.collections);
    let _ = write!(out, "\n    Time:        {} ms", delta.time_ms);
    if let Some(avg) = delta.average_ms() {
        let _ = write!(out, "\n    Average:     {:.2} ms", avg);
    }
}

/// Machine-readable summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub benchmark: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub system_info: SystemInfo,
    pub heap_max: MaxHeap,
    pub config: BenchConfig,
    pub phases: Vec<PhaseOutcome>,
    pub collectors: Vec<CollectorDelta>,
    pub final_snapshot: HeapSnapshot,
}

impl RunSummary {
    pub fn new(
        outcome: &RunOutcome,
        config: &BenchConfig,
        system_info: SystemInfo,
        heap_max: MaxHeap,
    ) -> Self {
        Self {
            benchmark: "heapstress".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: outcome.run.started_at(),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            system_info,
            heap_max,
            config: config.clone(),
            phases: outcome.phases.clone(),
            collectors: outcome.run.collector_deltas(&outcome.final_collectors),
            final_snapshot: outcome.final_snapshot,
        }
    }
}

/// JSON reporter for run summaries.
pub struct JsonReporter {
    /// Output directory for summary files
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a new JSON reporter with the specified output directory.
    pub fn new(output_dir: impl AsRef<Path>) -> BenchResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|e| BenchError::Io {
            context: "creating output directory",
            source: e,
        })?;
        Ok(Self { output_dir })
    }

    /// Save a summary to a timestamped JSON file and return its path.
    pub fn save(&self, summary: &RunSummary) -> BenchResult<PathBuf> {
        let timestamp = summary.started_at.format("%Y-%m-%dT%H-%M-%SZ");
        let filepath = self
            .output_dir
            .join(format!("heapstress_{}.json", timestamp));

        let file = File::create(&filepath).map_err(|e| BenchError::Io {
            context: "creating summary file",
            source: e,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), summary)?;

        Ok(filepath)
    }
}
