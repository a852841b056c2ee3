//! NATS JetStream broker sink.
//!
//! Each record is published as its 26-byte packed form to
//! `{topic}.{SYMBOL}`, with the record timestamp attached as a
//! `Qrsdp-Ts-Ns` header. Keying the subject by symbol gives per-symbol
//! ordering on the bus, which the sink preserves by funnelling every
//! record through one bounded channel into a single publisher task
//! (ack-awaited, bounded retries with exponential backoff).
//!
//! The sink is always best-effort: publish failures are counted and
//! logged, never surfaced to the producer. The Tokio runtime backing the
//! publisher tasks is a lazily-created process-wide singleton shared by
//! every broker sink in the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::sim::{DiskEventRecord, EventRecord};

use super::{EventSink, SinkError};

/// Maximum publish attempts per record (first try plus retries).
const MAX_PUBLISH_ATTEMPTS: u32 = 4;

/// Base delay for exponential backoff between retries.
const BASE_RETRY_DELAY_MS: u64 = 10;

/// Records buffered between the producer thread and the publisher task.
const CHANNEL_CAPACITY: usize = 8_192;

/// Header carrying the record timestamp on every published message.
const TS_HEADER: &str = "Qrsdp-Ts-Ns";

/// Process-wide runtime for broker publishing, created by the first sink.
static BROKER_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn shared_runtime() -> Result<&'static Runtime, SinkError> {
    if let Some(rt) = BROKER_RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("qrsdp-broker")
        .enable_all()
        .build()
        .map_err(|e| SinkError::Broker {
            message: format!("cannot build broker runtime: {e}"),
        })?;
    Ok(BROKER_RUNTIME.get_or_init(|| rt))
}

/// Connection parameters for the broker sink.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BrokerConfig {
    /// NATS server URL(s), e.g. `nats://localhost:4222`.
    pub servers: String,
    /// Topic prefix; records publish to `{topic}.{SYMBOL}`.
    pub topic: String,
}

impl BrokerConfig {
    /// JetStream stream name derived from the topic.
    #[must_use]
    pub fn stream_name(&self) -> String {
        self.topic
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .to_uppercase()
    }
}

/// One record queued for publication.
struct Outgoing {
    payload: Bytes,
    ts_ns: u64,
}

/// Best-effort JetStream publisher for one security's event stream.
pub struct BrokerSink {
    subject: String,
    tx: Option<mpsc::Sender<Outgoing>>,
    task: Option<tokio::task::JoinHandle<()>>,
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    /// Records dropped because the channel was full.
    dropped: u64,
}

impl BrokerSink {
    /// Connect to the broker, ensure the stream exists, and start the
    /// publisher task.
    ///
    /// Fails fast when the broker is unreachable; the runner treats that
    /// as "run without fanout", never as a fatal producer error.
    pub fn connect(config: &BrokerConfig, symbol: &str) -> Result<Self, SinkError> {
        let rt = shared_runtime()?;
        let servers = config.servers.clone();
        let stream_name = config.stream_name();
        let subjects = vec![format!("{}.>", config.topic)];

        let jetstream = rt.block_on(async move {
            let client =
                async_nats::connect(&servers)
                    .await
                    .map_err(|e| SinkError::Broker {
                        message: format!("connect to {servers} failed: {e}"),
                    })?;
            let jetstream = async_nats::jetstream::new(client);
            jetstream
                .get_or_create_stream(async_nats::jetstream::stream::Config {
                    name: stream_name,
                    subjects,
                    ..Default::default()
                })
                .await
                .map_err(|e| SinkError::Broker {
                    message: format!("stream setup failed: {e}"),
                })?;
            Ok::<_, SinkError>(jetstream)
        })?;

        let subject = format!("{}.{}", config.topic, symbol);
        let (tx, rx) = mpsc::channel::<Outgoing>(CHANNEL_CAPACITY);
        let published = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let task = rt.spawn(publish_loop(
            jetstream,
            subject.clone(),
            rx,
            Arc::clone(&published),
            Arc::clone(&failed),
        ));

        info!(subject = %subject, "broker sink connected");
        Ok(Self {
            subject,
            tx: Some(tx),
            task: Some(task),
            published,
            failed,
            dropped: 0,
        })
    }

    /// Messages acknowledged by the broker so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Messages abandoned after all retries.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl EventSink for BrokerSink {
    fn append(&mut self, event: &EventRecord) -> Result<(), SinkError> {
        let Some(tx) = &self.tx else {
            // Closed: fanout is best-effort, swallow silently.
            return Ok(());
        };
        let disk = DiskEventRecord::from(event);
        let outgoing = Outgoing {
            payload: Bytes::copy_from_slice(&disk.to_bytes()),
            ts_ns: event.ts_ns,
        };
        if tx.try_send(outgoing).is_err() {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                warn!(
                    subject = %self.subject,
                    dropped = self.dropped,
                    "broker channel full, dropping records"
                );
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        // Dropping the sender lets the publisher task drain and exit.
        self.tx = None;
        if let Some(task) = self.task.take() {
            let rt = shared_runtime()?;
            let _ = rt.block_on(task);
        }
        info!(
            subject = %self.subject,
            published = self.published(),
            failed = self.failed(),
            dropped = self.dropped,
            "broker sink closed"
        );
        Ok(())
    }
}

impl Drop for BrokerSink {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.close();
        }
    }
}

/// Sequential publisher: one in-flight message at a time preserves
/// per-subject ordering.
async fn publish_loop(
    jetstream: async_nats::jetstream::Context,
    subject: String,
    mut rx: mpsc::Receiver<Outgoing>,
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
) {
    while let Some(outgoing) = rx.recv().await {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(TS_HEADER, outgoing.ts_ns.to_string().as_str());

        let mut delivered = false;
        for attempt in 0..MAX_PUBLISH_ATTEMPTS {
            let publish = jetstream
                .publish_with_headers(subject.clone(), headers.clone(), outgoing.payload.clone())
                .await;
            match publish {
                Ok(ack_future) => match ack_future.await {
                    Ok(_) => {
                        delivered = true;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            attempt = attempt + 1,
                            subject = %subject,
                            error = %e,
                            "broker ack failed"
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        subject = %subject,
                        error = %e,
                        "broker publish failed"
                    );
                }
            }
            let delay = BASE_RETRY_DELAY_MS << attempt;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if delivered {
            published.fetch_add(1, Ordering::Relaxed);
        } else {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    debug!(subject = %subject, "broker publisher drained");
}
