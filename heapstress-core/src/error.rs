// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for heapstress.
//!
//! Errors are explicit enum variants. Only the binary edge collapses them
//! into `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::RunState;
use crate::types::HeapSnapshot;
use crate::workload::Phase;

/// Top-level error type for a benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Memory Exhaustion - Fatal, Never Retried
    // =========================================================================
    #[error(
        "Out of memory in {phase} phase at iteration {iteration}: \
         could not allocate {requested_bytes} bytes"
    )]
    OutOfMemory {
        phase: Phase,
        iteration: u64,
        requested_bytes: usize,
        /// Heap as it stood when the allocation was refused, taken while the
        /// failing workload still held its blocks.
        snapshot: HeapSnapshot,
    },

    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Run State Machine Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // Output Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize run summary: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BenchError {
    /// The heap at the point of failure, if this is an out-of-memory error.
    pub fn oom_snapshot(&self) -> Option<HeapSnapshot> {
        match self {
            Self::OutOfMemory { snapshot, .. } => Some(*snapshot),
            _ => None,
        }
    }
}

/// Configuration validation errors. Any of these prevents the run from starting.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Heap limit out of bounds: {limit_bytes} bytes (min: {min})")]
    HeapLimitOutOfBounds { limit_bytes: u64, min: u64 },
}

/// State transition errors for the run state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition benchmark run from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("Benchmark run is in terminal state: {state}")]
    TerminalState { state: RunState },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MaxHeap;

    #[test]
    fn test_out_of_memory_display() {
        let err = BenchError::OutOfMemory {
            phase: Phase::SmallObjects,
            iteration: 42,
            requested_bytes: 1024,
            snapshot: HeapSnapshot::new(900, 1000, MaxHeap::Bounded(1000)),
        };
        let msg = err.to_string();
        assert!(msg.contains("small-object"));
        assert!(msg.contains("42"));
        assert!(msg.contains("1024"));
        assert_eq!(err.oom_snapshot().map(|s| s.used_bytes()), Some(900));
    }

    #[test]
    fn test_error_chain() {
        let validation_err = ValidationError::InvalidFieldValue {
            field: "settle_ms",
            value: "-1".to_string(),
            reason: "must be non-negative".to_string(),
        };
        let bench_err: BenchError = validation_err.into();
        assert!(matches!(bench_err, BenchError::Validation(_)));
        assert!(bench_err.oom_snapshot().is_none());
    }

    #[test]
    fn test_transition_error_display() {
        let err = StateTransitionError::InvalidTransition {
            from: RunState::Init,
            to: RunState::Done,
        };
        assert!(err.to_string().contains("Init"));
        assert!(err.to_string().contains("Done"));
    }
}
