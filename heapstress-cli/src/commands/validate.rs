// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `heapstress validate` command - Validate configuration file.

use std::path::Path;

use heapstress_core::workload::SizePolicy;
use heapstress_core::{host, ConfigLoader, WorkloadSpec};

pub fn execute(file: &Path) -> anyhow::Result<()> {
    tracing::info!(file = %file.display(), "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let heap_max = config.heap_limit.resolve(host::total_memory());

            println!("✓ Configuration is valid");
            println!();
            println!("Run Settings:");
            println!("  Heap Limit:       {} (resolves to {})", config.heap_limit, heap_max);
            println!("  Relief Threshold: {:.2}", config.relief_threshold);
            println!("  Settle Pause:     {}ms", config.settle.as_millis());
            match config.seed {
                Some(seed) => println!("  Seed:             {}", seed),
                None => println!("  Seed:             (entropy)"),
            }
            println!();
            println!("Workloads:");
            for spec in config.workloads() {
                println!("  - {}", describe(&spec));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn describe(spec: &WorkloadSpec) -> String {
    let sizes = match spec.sizes {
        SizePolicy::Fixed { bytes } => format!("{} B", bytes),
        SizePolicy::Bimodal {
            small,
            large,
            small_probability,
        } => format!(
            "{} B ({:.0}%) / {} B",
            small,
            small_probability * 100.0,
            large
        ),
    };

    format!(
        "phase {} {} (iterations: {}, report every: {}, blocks: {})",
        spec.phase.number(),
        spec.phase,
        spec.iterations,
        spec.report_every,
        sizes
    )
}
