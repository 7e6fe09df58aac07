// crates/loanq-broker/src/queue.rs
// ============================================================================
// Module: Channel Write-Back Queue
// Description: Reference `WriteBackQueue` backed by a bounded Tokio channel.
// Purpose: Stand in for the out-of-scope message-queue client.
// Dependencies: loanq-core, async-trait, tokio
// ============================================================================

//! ## Overview
//! [`ChannelWriteBackQueue`] delivers durable write records by sending them
//! into a `tokio::sync::mpsc` channel via `try_send`, mirroring
//! `decision-gate-broker`'s `ChannelSink`: non-blocking, fails closed under
//! backpressure rather than waiting, since an enqueue failure here is a
//! logged durability warning, not a hot-path failure (§7).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use loanq_core::QueueError;
use loanq_core::WriteBackQueue;
use loanq_core::WriteBackRecord;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

/// A write-back record paired with its place in the channel, for consumers
/// that want delivery order.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBackMessage {
    /// The enqueued record.
    pub record: WriteBackRecord,
}

/// Reference [`WriteBackQueue`] backed by a bounded `tokio::sync::mpsc`
/// channel, standing in for the out-of-scope message-queue client.
///
/// # Invariants
/// - `enqueue` never blocks: a full or closed channel surfaces as
///   [`QueueError::Unavailable`] rather than waiting for capacity.
pub struct ChannelWriteBackQueue {
    sender: Sender<WriteBackMessage>,
}

impl ChannelWriteBackQueue {
    /// Creates a queue that publishes onto `sender`.
    #[must_use]
    pub fn new(sender: Sender<WriteBackMessage>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl WriteBackQueue for ChannelWriteBackQueue {
    async fn enqueue(&self, record: WriteBackRecord, _timeout: Duration) -> Result<(), QueueError> {
        self.sender.try_send(WriteBackMessage { record }).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Timeout,
            TrySendError::Closed(_) => QueueError::Unavailable("write-back channel closed".to_string()),
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use loanq_core::ProposalPid;
    use loanq_core::QuestionId;
    use loanq_core::Timestamp;

    use super::*;

    fn sample_record() -> WriteBackRecord {
        WriteBackRecord {
            proposal_pid: ProposalPid::from("P1"),
            question_id: QuestionId::from("Q1"),
            entity_pid: None,
            field_updates: std::collections::BTreeMap::new(),
            timestamp: Timestamp::from_unix_millis(1_000),
            raw_input: None,
            confidence: None,
        }
    }

    #[tokio::test]
    async fn enqueue_delivers_the_record() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let queue = ChannelWriteBackQueue::new(tx);
        queue.enqueue(sample_record(), Duration::from_millis(5)).await.expect("enqueues");

        let message = rx.recv().await.expect("delivered");
        assert_eq!(message.record.question_id, QuestionId::from("Q1"));
    }

    #[tokio::test]
    async fn enqueue_on_a_full_channel_fails_without_blocking() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let queue = ChannelWriteBackQueue::new(tx);
        queue.enqueue(sample_record(), Duration::from_millis(5)).await.expect("first fits");
        let err = queue.enqueue(sample_record(), Duration::from_millis(5)).await.expect_err("second is rejected");
        assert!(matches!(err, QueueError::Timeout));
    }

    #[tokio::test]
    async fn enqueue_on_a_closed_channel_is_unavailable() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        let queue = ChannelWriteBackQueue::new(tx);
        let err = queue.enqueue(sample_record(), Duration::from_millis(5)).await.expect_err("closed channel rejects");
        assert!(matches!(err, QueueError::Unavailable(_)));
    }
}
