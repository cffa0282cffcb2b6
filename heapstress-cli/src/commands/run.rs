// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `heapstress` (no subcommand) - Run the benchmark.

use heapstress_core::reporter::{format_banner, format_final_report};
use heapstress_core::{
    BenchConfig, ConfigLoader, ConsoleSink, HeapInspector, HeapLimit, JsonReporter, Orchestrator,
    RunSummary, SystemInfo, TrackedHeapInspector,
};

use crate::Cli;

/// Load the configuration file (if any) and apply command-line overrides.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<BenchConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)?,
        None => BenchConfig::default(),
    };

    if let Some(mb) = cli.heap_limit_mb {
        config.heap_limit = HeapLimit::from_mb(mb)?;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(ms) = cli.settle_ms {
        config = config.with_settle_ms(ms);
    }

    Ok(config)
}

pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli)?;

    let system_info = SystemInfo::collect();
    let heap_max = config.heap_limit.resolve(system_info.memory_bytes);
    tracing::info!(
        heap_limit = %config.heap_limit,
        heap_max = %heap_max,
        seed = ?config.seed,
        "Configuration resolved"
    );

    let mut inspector = TrackedHeapInspector::new(heap_max);
    println!(
        "{}",
        format_banner(&system_info, heap_max, &inspector.list_collectors())
    );

    let mut orchestrator = Orchestrator::new(&config, inspector, ConsoleSink::stdout());
    let outcome = orchestrator.run()?;

    println!("{}", format_final_report(&outcome));

    if let Some(dir) = &cli.json_dir {
        let reporter = JsonReporter::new(dir)?;
        let summary = RunSummary::new(&outcome, &config, system_info, heap_max);
        let path = reporter.save(&summary)?;
        println!();
        println!("Run summary saved to: {}", path.display());
    }

    Ok(())
}
