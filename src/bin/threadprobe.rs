//! threadprobe: inspect probe formatting and exercise nested probes.
//!
//! ```text
//! threadprobe format 93784005            # 1 day(s) 2:03:04.5
//! threadprobe format 2007000000 --unit-base 1000000
//! threadprobe demo --threads 4 --depth 3 --json target/probes.jsonl
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use threadprobe::{
    begin_probe, nest_probe, probe_count, Interval, JsonLinesReporter, LogReporter,
    MultiReporter, ProbeConfig, Reporter, MAX_UNIT_BASE,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "threadprobe",
    about = "Per-thread nested timing probes",
    long_about = "
threadprobe formats probe durations and runs a small nested-probe workload
that emits one structured line per ended probe.

Probe identity can be fixed with PROBE_HOST_ID and PROBE_RUN_ID; the unit
base of reported elapsed values with PROBE_UNIT_BASE.
"
)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Format a raw interval as `[D day(s) ]H:MM:SS.fff`
    Format(FormatArgs),
    /// Run nested probes on worker threads and report them
    Demo(DemoArgs),
}

#[derive(Debug, Parser)]
struct FormatArgs {
    /// Raw interval value
    #[arg(allow_hyphen_values = true)]
    raw: i64,

    /// Stored units per millisecond
    #[arg(long, default_value_t = 1)]
    unit_base: i64,
}

#[derive(Debug, Parser)]
struct DemoArgs {
    /// Worker threads, each with its own probe stack
    #[arg(long, default_value_t = 2)]
    threads: usize,

    /// Nesting depth per worker
    #[arg(long, default_value_t = 3)]
    depth: usize,

    /// Simulated work per level, in milliseconds
    #[arg(long, default_value_t = 5)]
    work_ms: u64,

    /// Emit a zero-duration checkpoint at the innermost level
    #[arg(long)]
    checkpoint: bool,

    /// Skip ending the middle levels, relying on the root to unwind them
    #[arg(long)]
    abandon: bool,

    /// Also append records as JSON lines to this file
    #[arg(long)]
    json: Option<PathBuf>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let config = ProbeConfig::from_env();
    let unit_base = config.unit_base;
    threadprobe::init(config).context("Failed to initialize probe settings")?;

    match cli.cmd {
        Commands::Format(args) => run_format(args),
        Commands::Demo(args) => run_demo(args, unit_base),
    }
}

fn run_format(args: FormatArgs) -> Result<()> {
    if !(1..=MAX_UNIT_BASE).contains(&args.unit_base) {
        bail!(
            "--unit-base must be between 1 and {}, got {}",
            MAX_UNIT_BASE,
            args.unit_base
        );
    }
    println!("{}", Interval::with_unit_base(args.raw, args.unit_base));
    Ok(())
}

// ============================================================================
// Demo Workload
// ============================================================================

fn run_demo(args: DemoArgs, unit_base: i64) -> Result<()> {
    if args.depth == 0 {
        bail!("--depth must be at least 1");
    }

    let mut reporters: Vec<Box<dyn Reporter>> =
        vec![Box::new(LogReporter::new(threadprobe::settings().config.level))];
    if let Some(ref path) = args.json {
        let json = JsonLinesReporter::create(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        log::info!("writing probe records to {}", json.path().display());
        reporters.push(Box::new(json));
    }
    let reporter = Arc::new(MultiReporter::new(reporters));
    let args = Arc::new(args);

    let handles = (0..args.threads.max(1))
        .map(|i| {
            let reporter = Arc::clone(&reporter);
            let args = Arc::clone(&args);
            thread::Builder::new()
                .name(format!("probe-worker-{}", i))
                .spawn(move || run_worker(&args, reporter.as_ref(), unit_base))
                .context("Failed to spawn worker thread")
        })
        .collect::<Result<Vec<_>>>()?;

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => bail!("Probe worker panicked"),
        }
    }

    reporter.flush();
    Ok(())
}

fn run_worker(args: &DemoArgs, reporter: &dyn Reporter, unit_base: i64) -> Result<()> {
    let work = Duration::from_millis(args.work_ms);
    let root = begin_probe("demo")?;
    let mut open = Vec::with_capacity(args.depth);

    for level in 1..args.depth {
        thread::sleep(work);
        open.push(nest_probe(format!("level{}", level))?);
    }

    if args.checkpoint {
        let cp = nest_probe("checkpoint")?;
        cp.checkpoint()?;
        reporter.report(&cp.record(unit_base));
    }

    while let Some(probe) = open.pop() {
        thread::sleep(work);
        if args.abandon && !open.is_empty() {
            continue;
        }
        probe.end()?;
        reporter.report(&probe.record(unit_base));
    }

    thread::sleep(work);
    root.end()?;
    reporter.report(&root.record(unit_base));

    log::debug!(
        "worker done, {} probe(s) left on stack",
        probe_count()
    );
    Ok(())
}
