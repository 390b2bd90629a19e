//! memsim command-line interface
//!
//! Runs a trace file through the allocator and reports the resulting
//! layout.
//!
//! # Examples
//!
//! ```bash
//! # Run a trace (header selects policy and capacity)
//! memsim run workload.trace
//!
//! # Force worst-fit regardless of the trace header
//! memsim run workload.trace --policy worst
//!
//! # Machine-readable final snapshot
//! memsim run workload.trace --json
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use memsim::{report, PlacementPolicy, Simulation, Trace};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Contiguous memory allocation simulator
#[derive(Parser, Debug)]
#[command(name = "memsim")]
#[command(version = memsim::VERSION)]
#[command(about = "Contiguous memory allocation simulator", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Dump the layout after every command (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a trace file through the allocator
    Run(RunArgs),

    /// Show version
    Version,
}

/// Run configuration arguments
#[derive(Args, Debug)]
struct RunArgs {
    /// Trace file: policy line, capacity line, then A/D/P commands
    trace: PathBuf,

    /// Override the placement policy from the trace header
    #[arg(long, value_enum, env = "MEMSIM_POLICY")]
    policy: Option<PlacementPolicy>,

    /// Emit the final snapshot as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli);

    // Execute command
    match cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Version => {
            println!("memsim {}", memsim::VERSION);
            Ok(())
        }
    }
}

/// Run a trace and report the final layout
fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let mut trace = Trace::from_path(&args.trace)
        .with_context(|| format!("failed to load trace {}", args.trace.display()))?;
    if let Some(policy) = args.policy {
        info!(%policy, "overriding trace policy");
        trace.policy = policy;
    }

    info!(policy = %trace.policy, capacity = trace.capacity, commands = trace.commands.len(), "starting run");

    let mut sim = Simulation::new(trace.capacity, trace.policy);
    for &command in &trace.commands {
        if let Some(layout) = sim.apply(command) {
            println!("{}", report::layout_table(&layout));
        }
    }

    let blocks = sim.snapshot();
    let stats = sim.stats();
    if args.json {
        println!("{}", report::snapshot_json(&blocks, &stats)?);
    } else {
        println!("{}", report::layout_table(&blocks));
        println!("{}", report::summary_line(&stats));
    }

    let summary = sim.summary();
    if summary.failed_allocations > 0 || summary.failed_deallocations > 0 {
        warn!(
            failed_allocations = summary.failed_allocations,
            failed_deallocations = summary.failed_deallocations,
            "run finished with rejected commands"
        );
    }

    Ok(())
}

/// Setup console logging with an env-filter override
fn setup_logging(cli: &Cli) {
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        cli.log_level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();
}
