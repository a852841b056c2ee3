//! # qrsdp-feed
//!
//! Wire-protocol feed handler: consumes event records from the bus topic
//! and re-emits them as ITCH messages in MoldUDP64 packets over UDP
//! multicast or unicast.
//!
//! # Usage
//!
//! ```bash
//! qrsdp-feed --servers nats://localhost:4222 --topic qrsdp --group feed-a \
//!            --mcast-group 239.192.0.1 --mcast-port 31001
//! qrsdp-feed --servers nats://localhost:4222 --topic qrsdp --group feed-b \
//!            --unicast 10.0.0.5:31001 --tick-size 100
//! ```

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use qrsdp::feed::{FeedConfig, FeedConsumer, FeedDestination, UdpFeedSender};

/// QRSDP wire-protocol feed handler.
#[derive(Parser)]
#[command(name = "qrsdp-feed", about = "ITCH/MoldUDP64 feed handler for qrsdp streams")]
struct Cli {
    /// NATS server URL(s).
    #[arg(long)]
    servers: String,

    /// Topic prefix the producers publish under.
    #[arg(long)]
    topic: String,

    /// Durable consumer name; restarts resume from the committed offset.
    #[arg(long)]
    group: String,

    /// Tick-size multiplier for wire prices.
    #[arg(long, default_value_t = 100)]
    tick_size: u32,

    /// Mold session id (up to 10 characters).
    #[arg(long, default_value = "QRSDP0001")]
    session_id: String,

    /// Multicast group address (requires --mcast-port).
    #[arg(long)]
    mcast_group: Option<Ipv4Addr>,

    /// Multicast destination port.
    #[arg(long)]
    mcast_port: Option<u16>,

    /// Multicast TTL.
    #[arg(long, default_value_t = 1)]
    mcast_ttl: u32,

    /// Unicast destination as host:port (alternative to multicast).
    #[arg(long)]
    unicast: Option<String>,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn destination(&self) -> Result<FeedDestination> {
        match (&self.mcast_group, &self.mcast_port, &self.unicast) {
            (Some(group), Some(port), None) => Ok(FeedDestination::Multicast {
                group: *group,
                port: *port,
                ttl: self.mcast_ttl,
            }),
            (None, None, Some(addr)) => Ok(FeedDestination::Unicast { addr: addr.clone() }),
            _ => anyhow::bail!(
                "exactly one destination is required: --mcast-group with --mcast-port, or --unicast"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let destination = cli.destination()?;
    let sender = UdpFeedSender::open(&destination)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "signal handler not installed");
        }
    }

    let config = FeedConfig {
        servers: cli.servers,
        topic: cli.topic,
        group: cli.group,
        tick_size: cli.tick_size,
        session_id: cli.session_id,
    };
    info!(topic = %config.topic, group = %config.group, "feed handler starting");

    let mut consumer = FeedConsumer::new(config, sender);
    consumer.run(&stop).await?;
    info!("feed handler exited");
    Ok(())
}
