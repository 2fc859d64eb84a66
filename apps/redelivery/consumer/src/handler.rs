//! The synthetic failure rule.

use crate::cli::Args;
use async_trait::async_trait;
use nats_consumer::{DeliveryMetadata, Disposition, MessageHandler, ShutdownCoordinator, ShutdownReason};
use std::time::Duration;
use tracing::{error, info};

/// Every message whose stream sequence is a multiple of this fails.
pub const FAILURE_INTERVAL: u64 = 10;

/// Whether the message at `stream_sequence` should fail.
pub fn is_synthetic_failure(stream_sequence: u64) -> bool {
    stream_sequence % FAILURE_INTERVAL == 0
}

/// Acks every message except each tenth one, which is left unacknowledged so
/// the broker redelivers it after its ack wait.
///
/// When the last expected message fails on its final delivery attempt the
/// handler waits out the grace period and then shuts the process down.
pub struct FailEveryTenth {
    last_message: u64,
    max_deliver: u64,
    grace_period: Duration,
    shutdown: ShutdownCoordinator,
}

impl FailEveryTenth {
    pub fn new(
        last_message: u64,
        max_deliver: u64,
        grace_period: Duration,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            last_message,
            max_deliver,
            grace_period,
            shutdown,
        }
    }

    pub fn from_args(args: &Args, shutdown: ShutdownCoordinator) -> Self {
        Self::new(args.msgs, args.max_deliver, args.grace_period, shutdown)
    }

    fn is_final_delivery(&self, metadata: &DeliveryMetadata) -> bool {
        metadata.stream_sequence == self.last_message && metadata.delivered == self.max_deliver
    }
}

#[async_trait]
impl MessageHandler for FailEveryTenth {
    async fn handle(&self, metadata: &DeliveryMetadata) -> Disposition {
        if !is_synthetic_failure(metadata.stream_sequence) {
            return Disposition::Ack;
        }

        error!(
            stream_seq = metadata.stream_sequence,
            id = %metadata.message_id().unwrap_or_default(),
            delivered = metadata.delivered,
            "Processing failed"
        );

        if self.is_final_delivery(metadata) {
            info!(
                duration = ?self.grace_period,
                "Expected number of messages to consume reached, sleeping before exiting"
            );
            tokio::time::sleep(self.grace_period).await;
            self.shutdown.shutdown(ShutdownReason::MessageBudgetReached);
        }

        Disposition::Leave
    }

    fn name(&self) -> &'static str {
        "fail_every_tenth"
    }
}
