mod workload;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use zel_core::config::LoaderConfig;
use zel_loader::{discover_enabled_drivers, inspect_drivers, Loader};
use zel_tracker::telemetry::read_telemetry;
use zel_tracker::TelemetrySummary;

use crate::workload::{print_outcome, run_workload, WorkloadOptions};

#[derive(Parser)]
#[command(name = "zel")]
#[command(about = "zel - layered driver loader diagnostics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the component version table for the current configuration
    Versions,

    /// List the driver libraries that would be loaded and whether each opens
    Drivers,

    /// Drive a synthetic workload through the loader over the null driver
    Run {
        /// Worker threads
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// Create/submit/destroy cycles per thread
        #[arg(short, long, default_value_t = 100)]
        cycles: usize,

        /// Telemetry CSV path (the process id is appended to the file name)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Leave the allocation and kernel alive every k-th cycle (0 = never)
        #[arg(long, default_value_t = 0)]
        leak_every: usize,

        /// Device allocation size per cycle, in bytes
        #[arg(long, default_value_t = 64 * 1024)]
        alloc_bytes: usize,

        /// Also enable parameter validation and the basic leak checker
        #[arg(long)]
        validate: bool,
    },

    /// Summarize a telemetry CSV written by the resource tracker
    Summarize {
        /// Telemetry file
        file: PathBuf,

        /// Entry points to list by RSS growth
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

fn main() -> anyhow::Result<()> {
    zel_common::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Versions => {
            let mut config = LoaderConfig::from_env();
            config.drivers.enable_null_driver = true;
            let loader = Loader::new(config)?;
            println!("  {:<40} {:>6} {:>10}", "Component", "Spec", "Library");
            for v in loader.component_versions() {
                println!(
                    "  {:<40} {:>6} {:>10}",
                    v.name(),
                    v.spec_version.to_string(),
                    v.library_version.to_string()
                );
            }
        }

        Commands::Drivers => {
            let config = LoaderConfig::from_env();
            let names = discover_enabled_drivers(&config);
            info!("checking {} driver candidate(s)", names.len());
            for status in inspect_drivers(&names) {
                let state = match (status.loaded, status.has_entry_symbol) {
                    (true, true) => "ok",
                    (true, false) => "loaded, no entry table",
                    (false, _) => "not loadable",
                };
                println!("  {:<40} {}", status.name, state);
                if let Some(err) = status.error {
                    println!("    {}", err);
                }
            }
            if config.drivers.enable_null_driver {
                println!("  {:<40} {}", "null", "enabled");
            }
        }

        Commands::Run {
            threads,
            cycles,
            csv,
            leak_every,
            alloc_bytes,
            validate,
        } => {
            let outcome = run_workload(&WorkloadOptions {
                threads,
                cycles,
                csv,
                leak_every,
                alloc_bytes,
                validate,
            })?;
            print_outcome(&outcome);
        }

        Commands::Summarize { file, top } => {
            let records = read_telemetry(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let s = TelemetrySummary::from_records(&records);
            println!("Telemetry:         {}", file.display());
            println!("Calls:             {}", s.rows);
            println!("Time span:         {} ms", s.duration_ms());
            println!("Peak VmRSS:        {} KB", s.peak_vm_rss);
            println!("Peak VmSize:       {} KB", s.peak_vm_size);
            println!("Peak total bytes:  {}", s.peak_total_memory_bytes);
            println!();
            println!("Peak live handles:");
            for (cat, peak) in &s.peak_live {
                println!("  {:<20} {:>8}", cat.label(), peak);
            }
            println!();
            println!("Top RSS growth by call:");
            for (call, kb) in s.rss_growth_by_call.iter().take(top) {
                println!("  {:<44} {:>10} KB", call, kb);
            }
        }
    }

    Ok(())
}
