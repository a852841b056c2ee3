//! Fault-isolated fanout to several sinks.

use tracing::warn;

use crate::sim::EventRecord;

use super::{EventSink, SinkError};

/// Forwards every `append` and `close` to all registered sinks in
/// registration order.
///
/// The first registered sink is the primary (the journal): its errors
/// propagate and terminate the session. Every later sink is best-effort:
/// failures are logged and counted, never surfaced to the producer.
#[derive(Default)]
pub struct MultiplexSink {
    sinks: Vec<Box<dyn EventSink>>,
    secondary_failures: u64,
}

impl MultiplexSink {
    /// An empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. The first registered sink is the primary.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register a sink in place.
    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Count of swallowed non-primary failures.
    #[must_use]
    pub fn secondary_failures(&self) -> u64 {
        self.secondary_failures
    }
}

impl EventSink for MultiplexSink {
    fn append(&mut self, event: &EventRecord) -> Result<(), SinkError> {
        for (idx, sink) in self.sinks.iter_mut().enumerate() {
            match sink.append(event) {
                Ok(()) => {}
                Err(err) if idx == 0 => return Err(err),
                Err(err) => {
                    self.secondary_failures += 1;
                    warn!(sink = idx, error = %err, "non-primary sink append failed");
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let mut primary_result = Ok(());
        for (idx, sink) in self.sinks.iter_mut().enumerate() {
            match sink.close() {
                Ok(()) => {}
                Err(err) if idx == 0 => primary_result = Err(err),
                Err(err) => {
                    self.secondary_failures += 1;
                    warn!(sink = idx, error = %err, "non-primary sink close failed");
                }
            }
        }
        primary_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{EventFlags, EventSide, EventType};
    use crate::sink::VecSink;

    fn event() -> EventRecord {
        EventRecord {
            ts_ns: 1,
            kind: EventType::AddAsk,
            side: EventSide::Ask,
            price_ticks: 10_001,
            qty: 1,
            order_id: 0,
            flags: EventFlags::empty(),
        }
    }

    /// A sink that fails every call, for fault-isolation tests.
    struct FailingSink;

    impl EventSink for FailingSink {
        fn append(&mut self, _event: &EventRecord) -> Result<(), SinkError> {
            Err(SinkError::Broker {
                message: "broker unreachable".to_string(),
            })
        }

        fn close(&mut self) -> Result<(), SinkError> {
            Err(SinkError::Broker {
                message: "broker unreachable".to_string(),
            })
        }
    }

    #[test]
    fn test_fanout_reaches_all_sinks() {
        let mut mux = MultiplexSink::new()
            .with_sink(Box::new(VecSink::new()))
            .with_sink(Box::new(VecSink::new()));
        for _ in 0..3 {
            mux.append(&event()).unwrap_or_else(|e| panic!("append: {e}"));
        }
        mux.close().unwrap_or_else(|e| panic!("close: {e}"));
        assert_eq!(mux.len(), 2);
        assert_eq!(mux.secondary_failures(), 0);
    }

    #[test]
    fn test_secondary_failure_is_swallowed() {
        let mut mux = MultiplexSink::new()
            .with_sink(Box::new(VecSink::new()))
            .with_sink(Box::new(FailingSink));
        for _ in 0..5 {
            mux.append(&event()).unwrap_or_else(|e| panic!("append: {e}"));
        }
        assert!(mux.close().is_ok());
        // 5 appends + 1 close.
        assert_eq!(mux.secondary_failures(), 6);
    }

    #[test]
    fn test_primary_failure_propagates() {
        let mut mux = MultiplexSink::new()
            .with_sink(Box::new(FailingSink))
            .with_sink(Box::new(VecSink::new()));
        assert!(mux.append(&event()).is_err());
        assert!(mux.close().is_err());
    }
}
