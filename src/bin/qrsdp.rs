//! # qrsdp
//!
//! Producer CLI: run a simulation from a JSON configuration, or inspect
//! journal files it produced.
//!
//! # Usage
//!
//! ```bash
//! qrsdp run config.json
//! qrsdp read out/2026-01-02.qrsdp --records --limit 20
//! qrsdp verify out/2026-01-02.qrsdp
//! qrsdp calibrate out/2026-01-02.qrsdp --out curves.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use qrsdp::journal::JournalReader;
use qrsdp::run::{RunConfig, SessionRunner};
use qrsdp::sim::{BookSeed, CurveEstimator};

/// Deterministic synthetic exchange event producer.
#[derive(Parser)]
#[command(name = "qrsdp", about = "Deterministic synthetic exchange event producer")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides.
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full simulation from a JSON configuration file.
    Run {
        /// Configuration file path (JSON).
        config: PathBuf,
    },

    /// Print a journal's header and chunk map, optionally with records.
    Read {
        /// Journal file path.
        file: PathBuf,

        /// Also print decoded records.
        #[arg(long)]
        records: bool,

        /// Maximum records to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Decode every chunk of a journal, reporting totals or the failure.
    Verify {
        /// Journal file path.
        file: PathBuf,
    },

    /// Estimate queue-reactive intensity curves from a recorded journal.
    Calibrate {
        /// Journal file path.
        file: PathBuf,

        /// Where to write the curve JSON; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Largest tabulated queue size.
        #[arg(long, default_value_t = 50)]
        n_max: usize,
    },
}

fn init_logging(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Run { config } => run(config),
        Command::Read {
            file,
            records,
            limit,
        } => read(file, records, limit),
        Command::Verify { file } => verify(file),
        Command::Calibrate { file, out, n_max } => calibrate(file, out, n_max),
    }
}

fn run(config_path: PathBuf) -> Result<()> {
    let config = RunConfig::from_json_file(&config_path)?;
    info!(
        config = %config_path.display(),
        securities = config.securities.len(),
        days = config.num_days,
        "configuration loaded"
    );

    let runner = SessionRunner::new(config)?;
    runner.install_signal_handler();
    let report = runner.run()?;

    let total_events: u64 = report
        .results
        .iter()
        .flatten()
        .map(|day| day.events_written)
        .sum();
    println!(
        "run {} complete: {} sessions, {} events, manifest at {}",
        report.run_id,
        report.results.iter().map(Vec::len).sum::<usize>(),
        total_events,
        report.manifest_path.display()
    );

    if report.failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} security worker(s) failed", report.failures.len())
    }
}

fn read(file: PathBuf, records: bool, limit: usize) -> Result<()> {
    let mut reader = JournalReader::open(&file)?;
    let header = *reader.header();
    println!(
        "{}: v{}.{}, seed {}, p0 {}, {}s session, {} levels, chunk capacity {}",
        file.display(),
        header.version_major,
        header.version_minor,
        header.seed,
        header.p0_ticks,
        header.session_seconds,
        header.levels_per_side,
        header.chunk_capacity
    );

    match reader.chunk_index() {
        Some(index) => {
            println!("indexed, {} chunk(s):", index.len());
            for (k, entry) in index.iter().enumerate() {
                println!(
                    "  chunk {k}: offset {}, {} record(s), ts {}..{}",
                    entry.file_offset, entry.record_count, entry.first_ts_ns, entry.last_ts_ns
                );
            }
        }
        None => println!("no index footer (sequential scan)"),
    }

    if records {
        let all = reader.read_all()?;
        for record in all.iter().take(limit) {
            println!(
                "  ts {} type {} side {} price {} qty {} order {}",
                record.ts_ns, record.kind, record.side, record.price_ticks, record.qty,
                record.order_id
            );
        }
        if all.len() > limit {
            println!("  … {} more", all.len() - limit);
        }
    }
    Ok(())
}

fn verify(file: PathBuf) -> Result<()> {
    let mut reader = JournalReader::open(&file)?;
    let chunks = reader.chunk_index().map(<[_]>::len);

    // Stream rather than materialise: verification cost stays flat in
    // journal size.
    let mut count = 0u64;
    let mut last_ts = 0u64;
    let mut monotone = true;
    for item in reader.records() {
        let record = item?;
        if record.ts_ns < last_ts {
            monotone = false;
        }
        last_ts = record.ts_ns;
        count += 1;
    }
    println!(
        "{}: OK, {} record(s), {} timestamps",
        file.display(),
        count,
        if monotone { "monotone" } else { "NON-MONOTONE" }
    );
    if let Some(chunk_count) = chunks {
        println!("  {chunk_count} indexed chunk(s)");
    }
    if !monotone {
        anyhow::bail!("timestamps regress within the journal");
    }
    Ok(())
}

fn calibrate(file: PathBuf, out: Option<PathBuf>, n_max: usize) -> Result<()> {
    let mut reader = JournalReader::open(&file)?;
    let header = *reader.header();
    // The journal is self-describing: replay against the same geometry
    // that produced it.
    let seed = BookSeed {
        p0_ticks: header.p0_ticks,
        levels_per_side: header.levels_per_side as usize,
        initial_spread_ticks: header.initial_spread_ticks as i32,
        initial_depth: header.initial_depth,
    };

    let mut estimator = CurveEstimator::new(&seed, n_max);
    let mut observed = 0u64;
    for item in reader.records() {
        estimator.observe(&item?);
        observed += 1;
    }
    let params = estimator.finish();
    info!(observed, levels = params.levels, "calibration complete");

    let json = serde_json::to_string_pretty(&params)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("{observed} record(s) observed, curves written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
