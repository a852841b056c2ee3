//! The session runner: per-security worker threads, day chaining, and
//! run artefacts.
//!
//! One OS thread per security; within a worker the day loop is strictly
//! sequential and each day's close price becomes the next day's open.
//! Workers share nothing but the read-only configuration and the
//! cooperative stop flag; every producer owns its RNG, book, samplers and
//! sinks outright.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::journal::JournalReader;
use crate::sim::Producer;
use crate::sink::{BrokerSink, EventSink, JournalSink, MultiplexSink};

use super::calendar::{business_day_on_or_after, next_business_day};
use super::config::RunConfig;
use super::manifest::{
    DayPerformance, Manifest, PerformanceReport, SecuritySessions, SessionEntry,
};
use super::RunError;

/// Everything recorded about one completed (security, day) session.
#[derive(Debug, Clone, Serialize)]
pub struct DayResult {
    /// Ticker symbol.
    pub symbol: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Journal path relative to the run directory.
    pub file: String,
    /// The session's derived seed.
    pub seed: u64,
    /// Opening mid price in ticks.
    pub open_ticks: i32,
    /// Closing mid price in ticks; chained into the next day.
    pub close_ticks: i32,
    /// Records emitted.
    pub events_written: u64,
    /// Final journal size in bytes.
    pub file_size: u64,
    /// Wall seconds spent producing and writing.
    pub write_seconds: f64,
    /// Wall seconds for the optional sequential read-back.
    pub read_seconds: Option<f64>,
}

/// Aggregate outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    /// Unique run identifier (also stamped into the manifest).
    pub run_id: String,
    /// Per-security day results, in configuration order.
    pub results: Vec<Vec<DayResult>>,
    /// Descriptions of per-security failures, if any.
    pub failures: Vec<String>,
    /// Where the manifest was written.
    pub manifest_path: PathBuf,
}

/// Orchestrates a run: spawns workers, joins them, writes the manifest.
pub struct SessionRunner {
    config: RunConfig,
    stop: Arc<AtomicBool>,
}

impl SessionRunner {
    /// Validate the configuration and build a runner.
    pub fn new(config: RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The cooperative stop flag shared with all workers.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Install a SIGINT/SIGTERM handler that raises the stop flag.
    ///
    /// Workers notice between events and between days, close their sinks
    /// cleanly, and the manifest still covers every completed day.
    pub fn install_signal_handler(&self) {
        let stop = Arc::clone(&self.stop);
        if let Err(e) = ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "signal handler not installed");
        }
    }

    /// Run all securities to completion and write the run artefacts.
    pub fn run(&self) -> Result<RunReport, RunError> {
        fs::create_dir_all(&self.config.out_dir).map_err(|e| RunError::Io {
            message: e.to_string(),
            path: Some(self.config.out_dir.clone()),
        })?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let multi = self.config.securities.len() > 1;
        info!(
            run_id = %run_id,
            securities = self.config.securities.len(),
            days = self.config.num_days,
            "run starting"
        );

        let mut results: Vec<Vec<DayResult>> = Vec::with_capacity(self.config.securities.len());
        let mut failures = Vec::new();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.securities.len())
                .map(|idx| {
                    let config = &self.config;
                    let stop = &self.stop;
                    scope.spawn(move || run_security(config, idx, multi, stop))
                })
                .collect();

            for (idx, handle) in handles.into_iter().enumerate() {
                let symbol = self.config.securities[idx].symbol.clone();
                match handle.join() {
                    Ok(Ok(days)) => results.push(days),
                    Ok(Err(e)) => {
                        error!(symbol = %symbol, error = %e, "security worker failed");
                        failures.push(format!("{symbol}: {e}"));
                        results.push(Vec::new());
                    }
                    Err(_) => {
                        error!(symbol = %symbol, "security worker panicked");
                        failures.push(format!("{symbol}: worker panicked"));
                        results.push(Vec::new());
                    }
                }
            }
        });

        let manifest = self.build_manifest(&run_id, multi, &results);
        let manifest_path = self.config.out_dir.join("manifest.json");
        manifest.write_to(&manifest_path)?;

        let performance = PerformanceReport {
            run_id: run_id.clone(),
            days: results
                .iter()
                .flatten()
                .map(|day| DayPerformance {
                    symbol: day.symbol.clone(),
                    date: day.date,
                    events_written: day.events_written,
                    file_size: day.file_size,
                    write_seconds: day.write_seconds,
                    read_seconds: day.read_seconds,
                })
                .collect(),
        };
        performance.write_to(self.config.out_dir.join("performance.json"))?;

        info!(run_id = %run_id, failures = failures.len(), "run finished");
        Ok(RunReport {
            run_id,
            results,
            failures,
            manifest_path,
        })
    }

    fn build_manifest(&self, run_id: &str, multi: bool, results: &[Vec<DayResult>]) -> Manifest {
        let entries = |days: &[DayResult]| {
            days.iter()
                .map(|day| SessionEntry {
                    date: day.date,
                    seed: day.seed,
                    file: day.file.clone(),
                })
                .collect::<Vec<_>>()
        };

        if multi {
            let securities = self
                .config
                .securities
                .iter()
                .zip(results)
                .map(|(security, days)| SecuritySessions {
                    symbol: security.symbol.clone(),
                    sessions: entries(days),
                })
                .collect();
            Manifest::multi(
                run_id.to_string(),
                self.config.base_seed,
                self.config.session_seconds,
                securities,
            )
        } else {
            Manifest::single(
                run_id.to_string(),
                self.config.base_seed,
                self.config.session_seconds,
                entries(results.first().map_or(&[][..], Vec::as_slice)),
            )
        }
    }
}

/// The per-security worker: sequential day loop with price chaining.
fn run_security(
    config: &RunConfig,
    idx: usize,
    multi: bool,
    stop: &AtomicBool,
) -> Result<Vec<DayResult>, RunError> {
    let security = &config.securities[idx];
    let dir = if multi {
        config.out_dir.join(&security.symbol)
    } else {
        config.out_dir.clone()
    };
    fs::create_dir_all(&dir).map_err(|e| RunError::Io {
        message: e.to_string(),
        path: Some(dir.clone()),
    })?;

    let mut results = Vec::new();
    let mut p0_ticks = security.p0_ticks;
    let mut date = business_day_on_or_after(config.start_date);
    let mut day = 0u32;

    while (config.num_days == 0 || day < config.num_days) && !stop.load(Ordering::Relaxed) {
        let session = config.session_for(idx, day, p0_ticks);
        let filename = format!("{}.qrsdp", date.format("%Y-%m-%d"));
        let path = dir.join(&filename);

        let journal = JournalSink::for_session(&path, &session, config.chunk_capacity)?;
        let mut sink = MultiplexSink::new().with_sink(Box::new(journal));
        if let Some(broker_config) = &config.broker {
            match BrokerSink::connect(broker_config, &security.symbol) {
                Ok(broker) => sink.push(Box::new(broker)),
                Err(e) => {
                    warn!(symbol = %security.symbol, error = %e, "broker unavailable, journal only");
                }
            }
        }

        let started = Instant::now();
        let mut producer = Producer::new(session.clone());
        let result = if config.realtime {
            producer.run_session_paced(&mut sink, config.speed, stop)
        } else {
            producer.run_session_with_stop(&mut sink, stop)
        }
        .map_err(RunError::Sink)?;
        sink.close().map_err(RunError::Sink)?;
        let write_seconds = started.elapsed().as_secs_f64();

        let file_size = fs::metadata(&path)
            .map_err(|e| RunError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?
            .len();

        let read_seconds = if config.measure_read_back {
            let read_started = Instant::now();
            let mut reader = JournalReader::open(&path)?;
            let records = reader.read_all()?;
            debug_assert_eq!(records.len() as u64, result.events_written);
            Some(read_started.elapsed().as_secs_f64())
        } else {
            None
        };

        info!(
            symbol = %security.symbol,
            date = %date,
            seed = session.seed,
            events = result.events_written,
            close = result.close_ticks,
            "day complete"
        );

        results.push(DayResult {
            symbol: security.symbol.clone(),
            date,
            file: if multi {
                format!("{}/{}", security.symbol, filename)
            } else {
                filename
            },
            seed: session.seed,
            open_ticks: p0_ticks,
            close_ticks: result.close_ticks,
            events_written: result.events_written,
            file_size,
            write_seconds,
            read_seconds,
        });

        p0_ticks = result.close_ticks;
        date = next_business_day(date);
        day += 1;
    }

    Ok(results)
}
