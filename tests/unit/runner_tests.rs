//! Session runner: multi-day chaining, manifests, fault isolation.

use chrono::NaiveDate;
use qrsdp::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| panic!("valid date"))
}

fn security(symbol: &str) -> SecurityConfig {
    SecurityConfig {
        symbol: symbol.to_string(),
        p0_ticks: 10_000,
        tick_size: 100,
        levels_per_side: 5,
        initial_spread_ticks: 2,
        initial_depth: 50,
        intensity: IntensityModel::Simple(SimpleImbalanceParams::default()),
        level_alpha: 0.7,
        spread_improve_coeff: 0.0,
        reinit_probability: 0.0,
        reinit_depth_mean: 0.0,
        market_open_ns: DEFAULT_MARKET_OPEN_NS,
    }
}

fn config(out_dir: std::path::PathBuf, securities: Vec<SecurityConfig>) -> RunConfig {
    RunConfig {
        base_seed: 100,
        num_days: 5,
        session_seconds: 60,
        out_dir,
        start_date: date(2026, 1, 2),
        securities,
        chunk_capacity: 4096,
        broker: None,
        realtime: false,
        speed: 1.0,
        measure_read_back: true,
    }
}

#[test]
fn test_five_day_chain_prices_and_manifest_order() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let cfg = config(dir.path().to_path_buf(), vec![security("QRSD")]);
    let runner = SessionRunner::new(cfg).unwrap_or_else(|e| panic!("runner: {e}"));
    let report = runner.run().unwrap_or_else(|e| panic!("run: {e}"));
    assert!(report.failures.is_empty());

    let days = &report.results[0];
    assert_eq!(days.len(), 5);

    // Business-day sequence skipping the first weekend of 2026.
    let expected_dates = [
        date(2026, 1, 2),
        date(2026, 1, 5),
        date(2026, 1, 6),
        date(2026, 1, 7),
        date(2026, 1, 8),
    ];
    for (day, expected) in days.iter().zip(expected_dates) {
        assert_eq!(day.date, expected);
    }

    // Sequential seeds and close-to-open price chaining.
    for (j, day) in days.iter().enumerate() {
        assert_eq!(day.seed, 100 + j as u64);
        assert!(day.events_written > 0);
        assert!(day.read_seconds.is_some());
        if j > 0 {
            assert_eq!(day.open_ticks, days[j - 1].close_ticks);
        } else {
            assert_eq!(day.open_ticks, 10_000);
        }
    }

    // Manifest: flat 1.0 format with the same five entries in order.
    let manifest_json =
        std::fs::read_to_string(&report.manifest_path).unwrap_or_default();
    let manifest: Manifest =
        serde_json::from_str(&manifest_json).unwrap_or_else(|e| panic!("manifest: {e}"));
    assert_eq!(manifest.format_version, "1.0");
    assert_eq!(manifest.producer, "qrsdp");
    assert_eq!(manifest.base_seed, 100);
    let sessions = manifest.sessions.unwrap_or_default();
    assert_eq!(sessions.len(), 5);
    for (entry, expected) in sessions.iter().zip(expected_dates) {
        assert_eq!(entry.date, expected);
    }

    // Every journal listed in the manifest exists and opens.
    for entry in &sessions {
        let path = dir.path().join(&entry.file);
        let reader = JournalReader::open(&path).unwrap_or_else(|e| panic!("open: {e}"));
        assert_eq!(reader.header().seed, entry.seed);
    }

    // The performance document is emitted alongside.
    assert!(dir.path().join("performance.json").exists());
}

#[test]
fn test_multi_security_nested_manifest_and_layout() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let mut cfg = config(
        dir.path().to_path_buf(),
        vec![security("AAAA"), security("BBBB")],
    );
    cfg.num_days = 2;
    cfg.session_seconds = 10;
    let runner = SessionRunner::new(cfg).unwrap_or_else(|e| panic!("runner: {e}"));
    let report = runner.run().unwrap_or_else(|e| panic!("run: {e}"));
    assert!(report.failures.is_empty());

    let manifest: Manifest = serde_json::from_str(
        &std::fs::read_to_string(&report.manifest_path).unwrap_or_default(),
    )
    .unwrap_or_else(|e| panic!("manifest: {e}"));
    assert_eq!(manifest.format_version, "1.1");
    assert!(manifest.sessions.is_none());
    let securities = manifest.securities.unwrap_or_default();
    assert_eq!(securities.len(), 2);
    assert_eq!(securities[0].symbol, "AAAA");
    assert_eq!(securities[1].symbol, "BBBB");

    // Journals nest under per-symbol directories.
    assert!(dir.path().join("AAAA/2026-01-02.qrsdp").exists());
    assert!(dir.path().join("BBBB/2026-01-05.qrsdp").exists());

    // Seed stride keeps the two securities' seeds disjoint.
    let seed_a = securities[0].sessions[0].seed;
    let seed_b = securities[1].sessions[0].seed;
    assert!(seed_b >= seed_a + 1024);

    // Streams with different seeds must actually differ.
    let mut reader_a =
        JournalReader::open(dir.path().join("AAAA/2026-01-02.qrsdp"))
            .unwrap_or_else(|e| panic!("open: {e}"));
    let mut reader_b =
        JournalReader::open(dir.path().join("BBBB/2026-01-02.qrsdp"))
            .unwrap_or_else(|e| panic!("open: {e}"));
    let records_a = reader_a.read_all().unwrap_or_else(|e| panic!("read: {e}"));
    let records_b = reader_b.read_all().unwrap_or_else(|e| panic!("read: {e}"));
    let n = records_a.len().min(records_b.len()).min(50);
    assert!(records_a[..n] != records_b[..n]);
}

#[test]
fn test_unreachable_broker_leaves_journal_intact() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let mut cfg = config(dir.path().to_path_buf(), vec![security("QRSD")]);
    cfg.num_days = 1;
    cfg.session_seconds = 5;
    // Nothing listens here: the broker sink fails to connect and the run
    // proceeds journal-only.
    cfg.broker = Some(BrokerConfig {
        servers: "nats://127.0.0.1:1".to_string(),
        topic: "qrsdp".to_string(),
    });

    let runner = SessionRunner::new(cfg).unwrap_or_else(|e| panic!("runner: {e}"));
    let report = runner.run().unwrap_or_else(|e| panic!("run: {e}"));
    assert!(report.failures.is_empty(), "broker outage must not fail the run");

    let day = &report.results[0][0];
    assert!(day.events_written > 0);
    let path = dir.path().join(&day.file);
    let mut reader = JournalReader::open(&path).unwrap_or_else(|e| panic!("open: {e}"));
    let records = reader.read_all().unwrap_or_else(|e| panic!("read: {e}"));
    assert_eq!(records.len() as u64, day.events_written);
}

#[test]
fn test_stop_flag_ends_run_early_with_valid_outputs() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let mut cfg = config(dir.path().to_path_buf(), vec![security("QRSD")]);
    cfg.num_days = 0; // until stopped
    cfg.session_seconds = 3_600;
    let runner = SessionRunner::new(cfg).unwrap_or_else(|e| panic!("runner: {e}"));

    // Raise the flag shortly after the run starts.
    let stop = runner.stop_flag();
    let raiser = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(200));
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    let report = runner.run().unwrap_or_else(|e| panic!("run: {e}"));
    raiser.join().unwrap_or_else(|_| panic!("raiser panicked"));
    assert!(report.failures.is_empty());
    // The manifest exists even for an interrupted run.
    assert!(report.manifest_path.exists());
}
