//! Lifecycle event sinks.
//!
//! [`JsonLineEmitter`] is the external contract: one JSON object per line on a
//! shared stream. [`BroadcastEmitter`] hands the same events to in-process
//! subscribers.

use std::io::Write;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::LifecycleEvent;

/// Destination for lifecycle events
///
/// Implementations must be safe to call from many items at once.
pub trait EventSink: Send + Sync {
    /// Publish one event
    fn emit(&self, event: &LifecycleEvent);
}

/// Writes each event as a single JSON line
///
/// The whole line is written under one lock, so concurrent items never
/// interleave partial records.
#[derive(Debug)]
pub struct JsonLineEmitter<W> {
    writer: Mutex<W>,
}

impl JsonLineEmitter<std::io::Stdout> {
    /// Emitter writing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLineEmitter<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Take the writer back, e.g. to inspect captured output
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> EventSink for JsonLineEmitter<W> {
    fn emit(&self, event: &LifecycleEvent) {
        let mut line = match serde_json::to_vec(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(item_id = event.id.0, error = %e, "failed to serialize lifecycle event");
                return;
            }
        };
        line.push(b'\n');

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writer.write_all(&line).and_then(|()| writer.flush()) {
            warn!(item_id = event.id.0, error = %e, "failed to write lifecycle event");
        }
    }
}

/// Publishes events on a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastEmitter {
    /// Create a channel holding up to `capacity` unread events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }
}

impl EventSink for BroadcastEmitter {
    fn emit(&self, event: &LifecycleEvent) {
        // No subscribers is fine
        self.event_tx.send(event.clone()).ok();
    }
}
