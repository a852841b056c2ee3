//! The bus consumer loop: bus records in, Mold-framed ITCH out.
//!
//! A feed handler is a separate single-threaded process. It attaches to
//! the bus topic with a durable consumer (so a restart resumes from the
//! committed position), translates each 26-byte record into an ITCH
//! message and pushes it through the Mold framer to the UDP sender.
//! Producer and feed handler are fully fault-isolated: the bus retains
//! messages while a handler is down.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sim::{DiskEventRecord, RECORD_SIZE};

use super::itch::{
    EVENT_END_OF_MARKET, EVENT_END_OF_MESSAGES, EVENT_START_OF_MARKET, EVENT_START_OF_MESSAGES,
    ItchEncoder, encode_system_event,
};
use super::mold::MoldFramer;
use super::udp::UdpFeedSender;
use super::FeedError;

/// How long to wait for a bus message before re-checking the stop flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Feed handler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// NATS server URL(s).
    pub servers: String,
    /// Topic prefix the producers publish under.
    pub topic: String,
    /// Durable consumer name; handlers with distinct names consume
    /// independently.
    pub group: String,
    /// Tick-size multiplier applied to wire prices.
    pub tick_size: u32,
    /// Mold session id (up to 10 characters).
    pub session_id: String,
}

/// Day-boundary detector over the record timestamp stream.
///
/// Timestamps restart from the market-open offset each day, so a
/// regression marks a day rollover.
#[derive(Debug, Default)]
pub struct DayTracker {
    last_ts_ns: u64,
    seen_first: bool,
}

/// What a new timestamp means for the session-event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTransition {
    /// The very first event: open the market.
    First,
    /// The timestamp regressed: close the previous day, open a new one.
    Rollover {
        /// Last timestamp of the finished day.
        prev_ts_ns: u64,
    },
    /// Still the same day.
    Same,
}

impl DayTracker {
    /// Feed the next timestamp and classify the transition.
    pub fn on_event(&mut self, ts_ns: u64) -> DayTransition {
        if !self.seen_first {
            self.seen_first = true;
            self.last_ts_ns = ts_ns;
            return DayTransition::First;
        }
        if ts_ns < self.last_ts_ns {
            let prev_ts_ns = self.last_ts_ns;
            self.last_ts_ns = ts_ns;
            return DayTransition::Rollover { prev_ts_ns };
        }
        self.last_ts_ns = ts_ns;
        DayTransition::Same
    }

    /// Timestamp of the last event seen, if any.
    #[must_use]
    pub fn last_seen(&self) -> Option<u64> {
        self.seen_first.then_some(self.last_ts_ns)
    }
}

/// The wire-protocol feed handler.
pub struct FeedConsumer {
    config: FeedConfig,
    framer: MoldFramer,
    sender: UdpFeedSender,
    encoders: HashMap<String, ItchEncoder>,
    next_locate: u16,
    day: DayTracker,
}

impl FeedConsumer {
    /// Build a handler sending through the given UDP sender.
    #[must_use]
    pub fn new(config: FeedConfig, sender: UdpFeedSender) -> Self {
        let framer = MoldFramer::new(&config.session_id);
        Self {
            config,
            framer,
            sender,
            encoders: HashMap::new(),
            next_locate: 0,
            day: DayTracker::default(),
        }
    }

    /// Consume the topic until the stop flag is raised or the stream ends.
    ///
    /// Emits the system-event lifecycle around the record stream: `O` at
    /// attach, `Q` on the first event and after each day rollover, `M` at
    /// each rollover and at shutdown, `E` at the very end.
    pub async fn run(&mut self, stop: &AtomicBool) -> Result<(), FeedError> {
        let bus = |e: &dyn std::fmt::Display| FeedError::Bus {
            message: e.to_string(),
        };

        let client = async_nats::connect(&self.config.servers)
            .await
            .map_err(|e| bus(&e))?;
        let jetstream = async_nats::jetstream::new(client);
        let stream = jetstream
            .get_or_create_stream(async_nats::jetstream::stream::Config {
                name: stream_name(&self.config.topic),
                subjects: vec![format!("{}.>", self.config.topic)],
                ..Default::default()
            })
            .await
            .map_err(|e| bus(&e))?;
        let consumer = stream
            .get_or_create_consumer(
                &self.config.group,
                async_nats::jetstream::consumer::pull::Config {
                    durable_name: Some(self.config.group.clone()),
                    deliver_policy: async_nats::jetstream::consumer::DeliverPolicy::All,
                    ack_policy: async_nats::jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| bus(&e))?;
        let mut messages = consumer.messages().await.map_err(|e| bus(&e))?;
        info!(
            topic = %self.config.topic,
            group = %self.config.group,
            "feed handler attached"
        );

        let Self {
            config,
            framer,
            sender,
            encoders,
            next_locate,
            day,
        } = self;
        let mut send = |pkt: &[u8]| sender.send(pkt);

        framer.add_message(&encode_system_event(0, EVENT_START_OF_MESSAGES), &mut send);
        framer.flush(&mut send);

        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let message = match tokio::time::timeout(POLL_TIMEOUT, messages.next()).await {
                Err(_) => {
                    // Idle topic: push out anything buffered, re-check stop.
                    framer.flush(&mut send);
                    continue;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "bus receive error");
                    continue;
                }
                Ok(Some(Ok(message))) => message,
            };

            if message.payload.len() != RECORD_SIZE {
                warn!(len = message.payload.len(), "skipping malformed payload");
                ack(&message).await;
                continue;
            }
            let mut packed = [0u8; RECORD_SIZE];
            packed.copy_from_slice(&message.payload);
            let record = DiskEventRecord::decode(&packed);

            let symbol = message
                .subject
                .as_str()
                .rsplit('.')
                .next()
                .unwrap_or("UNKNOWN")
                .to_string();

            match day.on_event(record.ts_ns) {
                DayTransition::First => {
                    framer.add_message(
                        &encode_system_event(record.ts_ns, EVENT_START_OF_MARKET),
                        &mut send,
                    );
                }
                DayTransition::Rollover { prev_ts_ns } => {
                    debug!(prev_ts_ns, ts_ns = record.ts_ns, "day rollover detected");
                    framer.add_message(
                        &encode_system_event(prev_ts_ns, EVENT_END_OF_MARKET),
                        &mut send,
                    );
                    framer.add_message(
                        &encode_system_event(record.ts_ns, EVENT_START_OF_MARKET),
                        &mut send,
                    );
                }
                DayTransition::Same => {}
            }

            let encoder = match encoders.entry(symbol) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    *next_locate += 1;
                    let encoder = ItchEncoder::new(entry.key(), *next_locate, config.tick_size);
                    framer.add_message(&encoder.stock_directory(record.ts_ns), &mut send);
                    entry.insert(encoder)
                }
            };
            if let Some(itch) = encoder.encode(&record) {
                framer.add_message(&itch, &mut send);
            }

            ack(&message).await;
        }

        if let Some(last) = day.last_seen() {
            framer.add_message(&encode_system_event(last, EVENT_END_OF_MARKET), &mut send);
        }
        let final_ts = day.last_seen().unwrap_or(0);
        framer.add_message(
            &encode_system_event(final_ts, EVENT_END_OF_MESSAGES),
            &mut send,
        );
        framer.flush(&mut send);
        info!(packets = sender.packets_sent(), "feed handler stopped");
        Ok(())
    }
}

/// Acknowledge a bus message; failures only cost a redelivery.
async fn ack(message: &async_nats::jetstream::Message) {
    if let Err(e) = message.ack().await {
        warn!(error = %e, "bus ack failed");
    }
}

/// JetStream stream name for a topic (mirrors the producer side).
fn stream_name(topic: &str) -> String {
    topic
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .to_uppercase()
}
