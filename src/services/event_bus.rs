//! EventBus service for in-process event distribution.
//!
//! Provides a broadcast-based event system with sequence numbering and
//! correlation tracking. Implements [`EventEmitter`] so breakers and the
//! validator can publish into it without knowing who listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::domain::models::EventBusConfig;
use crate::domain::ports::{EmitError, EventEmitter, EventPriority};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event envelope carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub priority: EventPriority,
    pub correlation_id: Option<Uuid>,
    pub payload: serde_json::Value,
}

impl SentinelEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            sequence: SequenceNumber::zero(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            priority: EventPriority::Normal,
            correlation_id: None,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Central event bus for broadcasting events to multiple consumers.
pub struct EventBus {
    sender: broadcast::Sender<SentinelEvent>,
    sequence: AtomicU64,
    correlation_context: Mutex<Option<Uuid>>,
}

impl EventBus {
    pub fn new(config: &EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
            correlation_context: Mutex::new(None),
        }
    }

    /// Publish an event. Returns the sequence number it was assigned.
    ///
    /// Never blocks. Events published with no subscriber are dropped.
    pub fn publish(&self, mut event: SentinelEvent) -> SequenceNumber {
        let seq = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        event.sequence = seq;

        if event.correlation_id.is_none() {
            event.correlation_id = *self.correlation();
        }

        if self.sender.send(event).is_err() {
            tracing::trace!(sequence = seq.0, "Event published with no subscribers");
        }
        seq
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SentinelEvent> {
        self.sender.subscribe()
    }

    /// Sequence number the next event will get.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    /// Start a new correlation context for tracking related events.
    pub fn start_correlation(&self) -> Uuid {
        let id = Uuid::new_v4();
        *self.correlation() = Some(id);
        id
    }

    pub fn end_correlation(&self) {
        *self.correlation() = None;
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn correlation(&self) -> std::sync::MutexGuard<'_, Option<Uuid>> {
        self.correlation_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(&EventBusConfig::default())
    }
}

impl EventEmitter for EventBus {
    fn emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        correlation_id: Option<Uuid>,
        priority: EventPriority,
    ) -> Result<(), EmitError> {
        let mut event = SentinelEvent::new(event_type, payload).with_priority(priority);
        event.correlation_id = correlation_id;
        self.publish(event);
        Ok(())
    }
}

/// Emitter backed by a bounded mpsc channel.
///
/// Unlike the bus it reports back-pressure: a full channel yields
/// [`EmitError::Full`] and a dropped receiver yields [`EmitError::Closed`].
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::Sender<SentinelEvent>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SentinelEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        correlation_id: Option<Uuid>,
        priority: EventPriority,
    ) -> Result<(), EmitError> {
        let mut event = SentinelEvent::new(event_type, payload).with_priority(priority);
        event.correlation_id = correlation_id;
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(event) => EmitError::Full {
                event_type: event.event_type,
            },
            mpsc::error::TrySendError::Closed(_) => EmitError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_event_bus_sequence_assignment() {
        let bus = EventBus::default();
        assert_eq!(bus.current_sequence().0, 0);

        let mut rx = bus.subscribe();

        bus.publish(SentinelEvent::new("first", json!({})));
        let event1 = rx.recv().await.unwrap();
        assert_eq!(event1.sequence.0, 0);

        bus.publish(SentinelEvent::new("second", json!({})));
        let event2 = rx.recv().await.unwrap();
        assert_eq!(event2.sequence.0, 1);
        assert_eq!(event2.event_type, "second");

        assert_eq!(bus.current_sequence().0, 2);
    }

    #[tokio::test]
    async fn test_event_bus_correlation() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(SentinelEvent::new("a", json!(null)));
        assert!(rx.recv().await.unwrap().correlation_id.is_none());

        let corr_id = bus.start_correlation();
        bus.publish(SentinelEvent::new("b", json!(null)));
        assert_eq!(rx.recv().await.unwrap().correlation_id, Some(corr_id));

        let explicit = Uuid::new_v4();
        bus.publish(SentinelEvent::new("c", json!(null)).with_correlation(explicit));
        assert_eq!(rx.recv().await.unwrap().correlation_id, Some(explicit));

        bus.end_correlation();
        bus.publish(SentinelEvent::new("d", json!(null)));
        assert!(rx.recv().await.unwrap().correlation_id.is_none());
    }

    #[test]
    fn test_emit_without_subscribers_or_runtime() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit("orphan", json!({"k": 1}), None, EventPriority::High)
            .unwrap();
        assert_eq!(bus.current_sequence().0, 1);
    }

    #[test]
    fn test_channel_emitter_reports_backpressure() {
        let (emitter, mut rx) = ChannelEmitter::new(1);

        emitter
            .emit("one", json!({}), None, EventPriority::Normal)
            .unwrap();
        let err = emitter
            .emit("two", json!({}), None, EventPriority::Normal)
            .unwrap_err();
        assert_eq!(
            err,
            EmitError::Full {
                event_type: "two".to_string()
            }
        );

        assert_eq!(rx.try_recv().unwrap().event_type, "one");
        drop(rx);
        assert_eq!(
            emitter
                .emit("three", json!({}), None, EventPriority::Normal)
                .unwrap_err(),
            EmitError::Closed
        );
    }
}
