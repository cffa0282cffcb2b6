// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! heapstress CLI
//!
//! Runs the memory-pressure benchmark against the process heap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use heapstress_core::TrackingAllocator;

mod commands;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

/// heapstress - memory-pressure benchmark for heap allocation and reclamation
#[derive(Parser)]
#[command(name = "heapstress")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Heap limit in MiB; 0 disables the limit
    #[arg(long, value_name = "MIB")]
    pub heap_limit_mb: Option<u64>,

    /// Seed for the mixed workload's size draws
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pause between phases in milliseconds
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,

    /// Directory to write a JSON run summary into
    #[arg(long, value_name = "DIR")]
    pub json_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration file and print the resolved settings
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the report.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Some(Commands::Validate { file }) => commands::validate::execute(file),
        None => commands::run::execute(&cli),
    }
}
