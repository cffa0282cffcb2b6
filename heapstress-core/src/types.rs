// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Value types shared by every component of a run.
//!
//! Snapshots validate their invariants at construction, so every
//! `HeapSnapshot` in flight satisfies `used <= committed <= max`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One kibibyte.
pub const KIB: u64 = 1024;
/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Smallest heap limit accepted from configuration: 16 MiB.
const MIN_HEAP_LIMIT: u64 = 16 * MIB;

/// Upper bound of the heap as reported by the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxHeap {
    /// The heap may grow to this many bytes.
    Bounded(u64),
    /// No limit is known. Ratio-based decisions never trigger.
    Unbounded,
}

impl MaxHeap {
    /// The bound in bytes, if there is one.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Bounded(bytes) => Some(*bytes),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for MaxHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(bytes) => write!(f, "{} bytes", bytes),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Point-in-time read of heap occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapSnapshot {
    used_bytes: u64,
    committed_bytes: u64,
    max: MaxHeap,
    taken_at: DateTime<Utc>,
}

impl HeapSnapshot {
    /// Build a snapshot from raw readings taken now.
    ///
    /// Raw readings come from independent counters and can be momentarily
    /// inconsistent, so they are normalized: `committed` is raised to at least
    /// `used`, and both are capped at a bounded `max`.
    pub fn new(used_bytes: u64, committed_bytes: u64, max: MaxHeap) -> Self {
        Self::at(used_bytes, committed_bytes, max, Utc::now())
    }

    /// Same as [`HeapSnapshot::new`] with an explicit timestamp.
    pub fn at(used_bytes: u64, committed_bytes: u64, max: MaxHeap, taken_at: DateTime<Utc>) -> Self {
        let mut committed_bytes = committed_bytes.max(used_bytes);
        let mut used_bytes = used_bytes;
        if let MaxHeap::Bounded(limit) = max {
            committed_bytes = committed_bytes.min(limit);
            used_bytes = used_bytes.min(committed_bytes);
        }

        Self {
            used_bytes,
            committed_bytes,
            max,
            taken_at,
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn committed_bytes(&self) -> u64 {
        self.committed_bytes
    }

    pub fn max(&self) -> MaxHeap {
        self.max
    }

    /// Bytes not in use, measured against the bound. `None` when unbounded.
    pub fn free_bytes(&self) -> Option<u64> {
        self.max.bytes().map(|max| max - self.used_bytes)
    }

    /// Fraction of the bound in use. `None` when unbounded or the bound is zero.
    pub fn usage_ratio(&self) -> Option<f64> {
        match self.max {
            MaxHeap::Bounded(max) if max > 0 => Some(self.used_bytes as f64 / max as f64),
            _ => None,
        }
    }
}

/// Cumulative activity of one collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorCounters {
    pub name: String,
    pub collection_count: u64,
    pub collection_time_ms: u64,
}

impl CollectorCounters {
    pub fn new(name: impl Into<String>, collection_count: u64, collection_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            collection_count,
            collection_time_ms,
        }
    }

    /// Activity since `baseline`. Counters never decrease, so a smaller
    /// reading (a restarted counter) clamps to zero instead of wrapping.
    pub fn delta_since(&self, baseline: Option<&CollectorCounters>) -> CollectorDelta {
        let (count, time) = baseline
            .map(|b| (b.collection_count, b.collection_time_ms))
            .unwrap_or((0, 0));

        CollectorDelta {
            name: self.name.clone(),
            collections: self.collection_count.saturating_sub(count),
            time_ms: self.collection_time_ms.saturating_sub(time),
        }
    }
}

/// Difference between a final and a baseline counter reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorDelta {
    pub name: String,
    pub collections: u64,
    pub time_ms: u64,
}

impl CollectorDelta {
    /// Average milliseconds per collection; `None` when nothing was collected.
    pub fn average_ms(&self) -> Option<f64> {
        (self.collections > 0).then(|| self.time_ms as f64 / self.collections as f64)
    }
}

/// Heap limit as requested by configuration, before resolution against the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapLimit {
    /// One quarter of physical memory.
    Auto,
    /// No limit is enforced.
    Unbounded,
    /// An explicit limit in bytes.
    Bytes(u64),
}

impl HeapLimit {
    /// Create an explicit limit with bounds validation.
    pub fn from_bytes(bytes: u64) -> Result<Self, ValidationError> {
        if bytes < MIN_HEAP_LIMIT {
            return Err(ValidationError::HeapLimitOutOfBounds {
                limit_bytes: bytes,
                min: MIN_HEAP_LIMIT,
            });
        }
        Ok(Self::Bytes(bytes))
    }

    /// Create from mebibytes; zero means unbounded.
    pub fn from_mb(mb: u64) -> Result<Self, ValidationError> {
        if mb == 0 {
            return Ok(Self::Unbounded);
        }
        Self::from_bytes(mb.saturating_mul(MIB))
    }

    /// Resolve against the host's physical memory.
    pub fn resolve(&self, total_memory_bytes: u64) -> MaxHeap {
        match self {
            Self::Auto if total_memory_bytes > 0 => {
                MaxHeap::Bounded((total_memory_bytes / 4).max(MIN_HEAP_LIMIT))
            }
            Self::Auto | Self::Unbounded => MaxHeap::Unbounded,
            Self::Bytes(bytes) => MaxHeap::Bounded(*bytes),
        }
    }
}

impl fmt::Display for HeapLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bytes(bytes) => write!(f, "{}MiB", bytes / MIB),
        }
    }
}
