// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Host identification printed at the top of every run.

use serde::Serialize;
use sysinfo::System;

/// Host the benchmark ran on.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    /// Absent on hosts without a separate kernel version string.
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    /// Physical memory; also the base for the `auto` heap limit.
    pub memory_bytes: u64,
    pub hostname: String,
    /// Allocator underneath [`TrackingAllocator`](crate::TrackingAllocator).
    pub allocator: String,
}

impl SystemInfo {
    /// Probe the host. Fields the host does not report read `"unknown"`.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let cpu_model = sys.cpus().first().map(|cpu| cpu.brand().trim().to_string());

        Self {
            os: or_unknown(System::name()),
            os_version: or_unknown(System::os_version()),
            kernel_version: System::kernel_version(),
            cpu_model: or_unknown(cpu_model.filter(|m| !m.is_empty())),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: or_unknown(System::host_name()),
            allocator: allocator_name().to_string(),
        }
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "unknown".to_string())
}

fn allocator_name() -> &'static str {
    if cfg!(all(target_os = "linux", target_env = "gnu")) {
        "glibc malloc (tracked)"
    } else {
        "system allocator (tracked)"
    }
}

/// Total physical memory in bytes, or 0 if the host does not report it.
pub fn total_memory() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_info_collect() {
        let info = SystemInfo::collect();
        assert!(!info.os.is_empty());
        assert!(info.cpu_cores > 0);
        assert!(info.memory_bytes > 0);
        assert!(info.allocator.contains("tracked"));
    }

    #[test]
    fn test_total_memory_matches_collect() {
        assert_eq!(total_memory(), SystemInfo::collect().memory_bytes);
    }
}
