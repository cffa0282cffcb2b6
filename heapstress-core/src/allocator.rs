// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Tracking global allocator.
//!
//! Wraps [`System`] and keeps process-wide counters of live heap bytes. It
//! also enforces an optional heap limit: an allocation that would push the
//! requested total past the limit returns null, which fallible allocation
//! APIs (`Vec::try_reserve_exact`) surface as an error instead of aborting.
//!
//! Install it in the binary:
//!
//! ```rust,ignore
//! use heapstress_core::TrackingAllocator;
//!
//! #[global_allocator]
//! static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();
//! ```
//!
//! Without the installation every reading stays at zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::types::MaxHeap;

/// Bytes requested by live allocations.
static USED_BYTES: AtomicU64 = AtomicU64::new(0);
/// Bytes the underlying allocator actually handed out for live allocations.
static COMMITTED_BYTES: AtomicU64 = AtomicU64::new(0);
/// Limit on `USED_BYTES`; `u64::MAX` means unbounded.
static LIMIT_BYTES: AtomicU64 = AtomicU64::new(u64::MAX);
/// Set on the first allocation routed through the tracker.
static INSTALLED: AtomicBool = AtomicBool::new(false);
/// Allocations refused because of the limit.
static REFUSED: AtomicU64 = AtomicU64::new(0);

/// Global allocator that counts live bytes and enforces a heap limit.
pub struct TrackingAllocator {
    inner: System,
}

impl TrackingAllocator {
    pub const fn new() -> Self {
        Self { inner: System }
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time totals read from the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapTotals {
    pub used_bytes: u64,
    pub committed_bytes: u64,
    pub max: MaxHeap,
}

/// Read the current totals.
pub fn heap_totals() -> HeapTotals {
    HeapTotals {
        used_bytes: USED_BYTES.load(Ordering::Relaxed),
        committed_bytes: COMMITTED_BYTES.load(Ordering::Relaxed),
        max: heap_limit(),
    }
}

/// Set the limit enforced on future allocations. Live allocations are unaffected.
pub fn set_heap_limit(max: MaxHeap) {
    let limit = match max {
        MaxHeap::Bounded(bytes) => bytes,
        MaxHeap::Unbounded => u64::MAX,
    };
    LIMIT_BYTES.store(limit, Ordering::Relaxed);
}

/// The limit currently enforced.
pub fn heap_limit() -> MaxHeap {
    match LIMIT_BYTES.load(Ordering::Relaxed) {
        u64::MAX => MaxHeap::Unbounded,
        bytes => MaxHeap::Bounded(bytes),
    }
}

/// True once any allocation has gone through [`TrackingAllocator`].
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Relaxed)
}

/// Number of allocations refused because they would exceed the limit.
pub fn refused_allocations() -> u64 {
    REFUSED.load(Ordering::Relaxed)
}

/// Claim `size` bytes against the limit. Returns false if the limit would be exceeded.
fn reserve(size: u64) -> bool {
    let limit = LIMIT_BYTES.load(Ordering::Relaxed);
    let claimed = USED_BYTES
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
            used.checked_add(size).filter(|&total| total <= limit)
        })
        .is_ok();
    if !claimed {
        REFUSED.fetch_add(1, Ordering::Relaxed);
    }
    claimed
}

fn release(size: u64) {
    USED_BYTES.fetch_sub(size, Ordering::Relaxed);
}

/// Bytes actually backing `ptr`.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn usable_size(ptr: *mut u8, layout: Layout) -> u64 {
    // SAFETY: `ptr` was returned by the system allocator (glibc malloc family)
    // and has not been freed yet.
    let usable = unsafe { libc::malloc_usable_size(ptr.cast()) };
    usable.max(layout.size()) as u64
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn usable_size(_ptr: *mut u8, layout: Layout) -> u64 {
    layout.size() as u64
}

// SAFETY: every method forwards to `System` with the caller's layout and
// pointer unchanged; the counters never influence what memory is returned,
// only whether an allocation is attempted.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        INSTALLED.store(true, Ordering::Relaxed);
        let size = layout.size() as u64;
        if !reserve(size) {
            return std::ptr::null_mut();
        }

        // SAFETY: forwarded contract of `GlobalAlloc::alloc`.
        let ptr = unsafe { self.inner.alloc(layout) };
        if ptr.is_null() {
            release(size);
        } else {
            COMMITTED_BYTES.fetch_add(usable_size(ptr, layout), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        INSTALLED.store(true, Ordering::Relaxed);
        let size = layout.size() as u64;
        if !reserve(size) {
            return std::ptr::null_mut();
        }

        // SAFETY: forwarded contract of `GlobalAlloc::alloc_zeroed`.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if ptr.is_null() {
            release(size);
        } else {
            COMMITTED_BYTES.fetch_add(usable_size(ptr, layout), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        COMMITTED_BYTES.fetch_sub(usable_size(ptr, layout), Ordering::Relaxed);
        release(layout.size() as u64);
        // SAFETY: forwarded contract of `GlobalAlloc::dealloc`.
        unsafe { self.inner.dealloc(ptr, layout) };
    }
}
