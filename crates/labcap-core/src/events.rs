//! # Turn Event Channel
//!
//! The streaming result correlator's transport: a per-conversation-turn
//! channel that carries validation results from capture operations to the
//! concurrently-running response-stream consumer.
//!
//! The channel is an explicit value handed to the capture operation by
//! its caller, not ambient task-local state, so the coupling between the
//! streaming consumer and the store stays visible. It is created at turn
//! start and discarded at turn end; results from one turn can never leak
//! into another.
//!
//! Publishing never blocks: the channel is bounded but publishers use
//! `try_send`, so a full or consumer-less channel drops the event rather
//! than stalling a store write. If nobody ever drains, the value is
//! simply never delivered.

use crate::primitives::TURN_EVENT_CAPACITY;
use crate::types::{RecordId, RecordType, ValidationResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// =============================================================================
// EVENTS
// =============================================================================

/// A validation result produced by one capture operation within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEvent {
    pub record_id: RecordId,
    pub record_type: RecordType,
    pub validation: ValidationResult,
}

/// A validation event attributed to the tool invocation that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedValidation {
    pub tool_use_id: String,
    #[serde(flatten)]
    pub event: ValidationEvent,
}

// =============================================================================
// CHANNEL
// =============================================================================

/// Create the channel for one conversation turn.
pub fn turn_channel() -> (TurnSender, TurnReceiver) {
    let (tx, rx) = mpsc::channel(TURN_EVENT_CAPACITY);
    (TurnSender { tx }, TurnReceiver { rx })
}

/// Publishing side, held by the capture path.
#[derive(Debug, Clone)]
pub struct TurnSender {
    tx: mpsc::Sender<ValidationEvent>,
}

impl TurnSender {
    /// Publish a validation event without blocking.
    ///
    /// A full channel or a dropped receiver loses the event; delivery is
    /// best-effort and never an error for the capture path.
    pub fn publish(&self, event: ValidationEvent) {
        if let Err(error) = self.tx.try_send(event) {
            tracing::debug!(%error, "turn validation event dropped");
        }
    }
}

/// Consuming side, held by the stream handler for the turn.
#[derive(Debug)]
pub struct TurnReceiver {
    rx: mpsc::Receiver<ValidationEvent>,
}

impl TurnReceiver {
    /// Drain everything currently queued, without waiting.
    pub fn try_drain(&mut self) -> Vec<ValidationEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Await the next event, for consumers that want to block.
    pub async fn recv(&mut self) -> Option<ValidationEvent> {
        self.rx.recv().await
    }
}

// =============================================================================
// TOOL-USE CORRELATION
// =============================================================================

/// Pairs drained validation events with the most recent tool invocation
/// id the stream consumer has observed.
///
/// At most one pending id is tracked: observing a new invocation replaces
/// the previous one, so the consumer is responsible for draining between
/// tool invocations if it wants each result attached to the correct,
/// immediately-preceding id. Events drained while no id is pending are
/// discarded.
#[derive(Debug, Default)]
pub struct ToolUseCorrelator {
    pending: Option<String>,
}

impl ToolUseCorrelator {
    /// Create a correlator with no pending invocation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a tool invocation observed in the stream.
    pub fn observe(&mut self, tool_use_id: impl Into<String>) {
        self.pending = Some(tool_use_id.into());
    }

    /// The currently pending invocation id, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Drain the receiver and attribute events to the pending invocation.
    ///
    /// The pending id is consumed by the first event it attaches to, so
    /// each delivered result is used exactly once.
    pub fn attach(&mut self, receiver: &mut TurnReceiver) -> Vec<AttributedValidation> {
        let mut attributed = Vec::new();
        for event in receiver.try_drain() {
            match self.pending.take() {
                Some(tool_use_id) => attributed.push(AttributedValidation { tool_use_id, event }),
                None => {
                    tracing::debug!(
                        record_id = %event.record_id,
                        "validation event with no pending tool invocation; discarded"
                    );
                }
            }
        }
        attributed
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaConfig;
    use crate::validation::validate;
    use serde_json::json;

    fn sample_event() -> ValidationEvent {
        ValidationEvent {
            record_id: RecordId::generate(),
            record_type: RecordType::Subject,
            validation: validate(
                RecordType::Subject,
                &json!({"subject_id": "553429"}),
                &SchemaConfig::default(),
            ),
        }
    }

    #[tokio::test]
    async fn publish_then_drain_delivers_once() {
        let (sender, mut receiver) = turn_channel();
        sender.publish(sample_event());

        let drained = receiver.try_drain();
        assert_eq!(drained.len(), 1);
        assert!(receiver.try_drain().is_empty());
    }

    #[tokio::test]
    async fn publish_without_consumer_never_blocks() {
        let (sender, receiver) = turn_channel();
        drop(receiver);
        // The receiver is gone; publishing is a silent no-op.
        sender.publish(sample_event());
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sender, mut receiver) = turn_channel();
        for _ in 0..(TURN_EVENT_CAPACITY + 5) {
            sender.publish(sample_event());
        }
        assert_eq!(receiver.try_drain().len(), TURN_EVENT_CAPACITY);
    }

    #[tokio::test]
    async fn correlator_attaches_to_most_recent_invocation() {
        let (sender, mut receiver) = turn_channel();
        let mut correlator = ToolUseCorrelator::new();

        correlator.observe("toolu_01");
        sender.publish(sample_event());

        let attributed = correlator.attach(&mut receiver);
        assert_eq!(attributed.len(), 1);
        assert_eq!(attributed[0].tool_use_id, "toolu_01");
        assert!(correlator.pending().is_none());
    }

    #[tokio::test]
    async fn each_result_attaches_exactly_once() {
        let (sender, mut receiver) = turn_channel();
        let mut correlator = ToolUseCorrelator::new();

        // First capture.
        correlator.observe("toolu_01");
        sender.publish(sample_event());
        let first = correlator.attach(&mut receiver);
        assert_eq!(first.len(), 1);

        // Draining again attaches nothing.
        assert!(correlator.attach(&mut receiver).is_empty());

        // Second capture with its own id.
        correlator.observe("toolu_02");
        sender.publish(sample_event());
        let second = correlator.attach(&mut receiver);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].tool_use_id, "toolu_02");
    }

    #[tokio::test]
    async fn events_without_pending_invocation_are_discarded() {
        let (sender, mut receiver) = turn_channel();
        let mut correlator = ToolUseCorrelator::new();

        sender.publish(sample_event());
        assert!(correlator.attach(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn undrained_captures_attach_only_the_first() {
        // Two captures landed before any drain; the caller broke the
        // drain-between-invocations contract, so only one pending id
        // exists and only the first event gets it.
        let (sender, mut receiver) = turn_channel();
        let mut correlator = ToolUseCorrelator::new();

        correlator.observe("toolu_01");
        correlator.observe("toolu_02");
        sender.publish(sample_event());
        sender.publish(sample_event());

        let attributed = correlator.attach(&mut receiver);
        assert_eq!(attributed.len(), 1);
        assert_eq!(attributed[0].tool_use_id, "toolu_02");
    }

    #[tokio::test]
    async fn channels_are_turn_scoped() {
        let (first_sender, mut first_receiver) = turn_channel();
        first_sender.publish(sample_event());
        drop(first_sender);
        assert_eq!(first_receiver.try_drain().len(), 1);

        // A fresh turn gets a fresh channel; nothing leaks across.
        let (_second_sender, mut second_receiver) = turn_channel();
        assert!(second_receiver.try_drain().is_empty());
    }

    #[tokio::test]
    async fn recv_awaits_published_events() {
        let (sender, mut receiver) = turn_channel();
        let event = sample_event();
        let expected = event.record_id.clone();
        sender.publish(event);

        let received = receiver.recv().await.expect("event");
        assert_eq!(received.record_id, expected);
    }
}
