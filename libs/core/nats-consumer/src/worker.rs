//! Consume loop: deliver each message to a handler and apply its disposition.

use crate::consumer::{Acknowledger, Delivery, NatsConsumer};
use crate::error::NatsError;
use crate::handler::{Disposition, MessageHandler};
use crate::metadata::{DeliveryMetadata, MessageIdStatus};
use crate::metrics::ConsumerMetrics;
use crate::shutdown::{ShutdownCoordinator, ShutdownReason};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Worker that feeds a durable JetStream consumer into a [`MessageHandler`].
pub struct NatsWorker<H: MessageHandler> {
    consumer: NatsConsumer,
    handler: Arc<H>,
    shutdown: ShutdownCoordinator,
    metrics: ConsumerMetrics,
    expected_max_deliver: Option<u64>,
}

impl<H: MessageHandler> NatsWorker<H> {
    /// Create a new worker.
    pub fn new(consumer: NatsConsumer, handler: H, shutdown: ShutdownCoordinator) -> Self {
        let metrics = ConsumerMetrics::new(consumer.stream_name(), consumer.consumer_name());
        Self {
            consumer,
            handler: Arc::new(handler),
            shutdown,
            metrics,
            expected_max_deliver: None,
        }
    }

    /// Warn at startup when the consumer's configured max deliver differs.
    pub fn with_expected_max_deliver(mut self, max_deliver: u64) -> Self {
        self.expected_max_deliver = Some(max_deliver);
        self
    }

    /// Run until shutdown is initiated.
    ///
    /// Fails only if the consumer cannot be found or its message stream
    /// cannot be opened or ends. Per-message problems are logged.
    pub async fn run(&self) -> Result<ShutdownReason, NatsError> {
        let consumer = self.consumer.lookup().await?;
        let configured_max_deliver = consumer.cached_info().config.max_deliver;
        if let Some(expected) = self.expected_max_deliver {
            if i64::try_from(expected).ok() != Some(configured_max_deliver) {
                warn!(
                    expected,
                    configured = configured_max_deliver,
                    "Consumer max deliver differs from the expected value"
                );
            }
        }
        info!(
            stream = %self.consumer.stream_name(),
            consumer = %self.consumer.consumer_name(),
            handler = self.handler.name(),
            "Connected to consumer"
        );

        let mut messages = self.consumer.messages(&consumer).await?;
        let result = consume(
            &mut messages,
            self.handler.as_ref(),
            &self.shutdown,
            &self.metrics,
        )
        .await;

        drop(messages);
        if let Err(e) = self.consumer.flush().await {
            warn!(error = %e, "Failed to flush connection");
        }

        let reason = result?;
        info!(reason = %reason, "NATS consumer stopped");
        Ok(reason)
    }
}

/// Dispatch deliveries from `messages` until shutdown is initiated.
///
/// Receive errors are logged and skipped. The end of the stream is an error,
/// since a durable consumer's stream never ends on its own.
pub async fn consume<S, D, E, H>(
    mut messages: S,
    handler: &H,
    shutdown: &ShutdownCoordinator,
    metrics: &ConsumerMetrics,
) -> Result<ShutdownReason, NatsError>
where
    S: Stream<Item = Result<D, E>> + Unpin,
    D: Delivery,
    E: Display,
    H: MessageHandler + ?Sized,
{
    loop {
        let next = tokio::select! {
            biased;
            reason = shutdown.wait() => return Ok(reason),
            next = messages.next() => next,
        };

        match next {
            Some(Ok(delivery)) => {
                let metadata = delivery.metadata();
                // A signal during a slow handler ends the run without waiting for it.
                tokio::select! {
                    biased;
                    reason = shutdown.wait() => return Ok(reason),
                    _ = dispatch(handler, metadata, &delivery, metrics) => {}
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "Error receiving message");
            }
            None => {
                return Err(NatsError::Messages("message stream ended".to_string()));
            }
        }
    }
}

/// Deliver one message to the handler and send the resulting ack or nak.
///
/// A delivery whose metadata cannot be read is naked without reaching the
/// handler. Ack and nak failures are logged and never retried. Returns the
/// disposition that was applied.
pub async fn dispatch<H, A>(
    handler: &H,
    metadata: Result<DeliveryMetadata, NatsError>,
    acker: &A,
    metrics: &ConsumerMetrics,
) -> Disposition
where
    H: MessageHandler + ?Sized,
    A: Acknowledger + ?Sized,
{
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(e) => {
            error!(error = %e, "failed to get msg metadata");
            metrics.metadata_failed();
            if let Err(e) = acker.nak().await {
                error!(error = %e, "failed to NACK msg");
                metrics.ack_failed("nak");
            }
            return Disposition::Nak;
        }
    };

    match metadata.message_id_status() {
        MessageIdStatus::Missing => warn!(
            stream = %metadata.stream,
            stream_seq = metadata.stream_sequence,
            consumer_seq = metadata.consumer_sequence,
            subject = %metadata.subject,
            "msg without ID"
        ),
        MessageIdStatus::Multiple => warn!(
            stream = %metadata.stream,
            stream_seq = metadata.stream_sequence,
            consumer_seq = metadata.consumer_sequence,
            subject = %metadata.subject,
            ids = ?metadata.message_ids,
            "msg with multiple IDs"
        ),
        MessageIdStatus::Single => {}
    }

    let id = metadata.message_id().unwrap_or_default();
    info!(
        stream = %metadata.stream,
        stream_seq = metadata.stream_sequence,
        consumer_seq = metadata.consumer_sequence,
        subject = %metadata.subject,
        id = %id,
        delivered = metadata.delivered,
        "msg received"
    );
    metrics.message_received(metadata.is_redelivery());

    let disposition = handler.handle(&metadata).await;
    debug!(
        handler = handler.name(),
        stream_seq = metadata.stream_sequence,
        disposition = disposition.as_str(),
        "Handler decided"
    );

    match disposition {
        Disposition::Ack => match acker.ack().await {
            Ok(()) => {
                metrics.message_acked();
                info!(stream_seq = metadata.stream_sequence, id = %id, "Processing succeeded");
            }
            Err(e) => {
                metrics.ack_failed("ack");
                error!(
                    error = %e,
                    consumer_seq = metadata.consumer_sequence,
                    stream_seq = metadata.stream_sequence,
                    id = %id,
                    "failed to ACK msg"
                );
            }
        },
        Disposition::Nak => match acker.nak().await {
            Ok(()) => metrics.message_naked(),
            Err(e) => {
                metrics.ack_failed("nak");
                error!(
                    error = %e,
                    consumer_seq = metadata.consumer_sequence,
                    stream_seq = metadata.stream_sequence,
                    id = %id,
                    "failed to NACK msg"
                );
            }
        },
        Disposition::Leave => {
            metrics.message_left();
            debug!(
                stream_seq = metadata.stream_sequence,
                delivered = metadata.delivered,
                "Leaving msg for redelivery"
            );
        }
    }

    disposition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::MockAcknowledger;
    use crate::handler::MockMessageHandler;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn metadata(stream_sequence: u64) -> DeliveryMetadata {
        DeliveryMetadata {
            stream: "ORDERS".to_string(),
            consumer: "processor".to_string(),
            stream_sequence,
            consumer_sequence: stream_sequence,
            delivered: 1,
            pending: 0,
            subject: "orders.created".to_string(),
            message_ids: vec![format!("order-{stream_sequence}")],
        }
    }

    fn metrics() -> ConsumerMetrics {
        ConsumerMetrics::new("ORDERS", "processor")
    }

    /// Delivery with fixed metadata that counts the acks sent for it.
    struct TestDelivery {
        metadata: DeliveryMetadata,
        acks: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Acknowledger for TestDelivery {
        async fn ack(&self) -> Result<(), NatsError> {
            self.acks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn nak(&self) -> Result<(), NatsError> {
            Ok(())
        }
    }

    impl Delivery for TestDelivery {
        fn metadata(&self) -> Result<DeliveryMetadata, NatsError> {
            Ok(self.metadata.clone())
        }
    }

    type Received = Result<TestDelivery, &'static str>;

    fn delivery(stream_sequence: u64, acks: &Arc<AtomicUsize>) -> Received {
        Ok(TestDelivery {
            metadata: metadata(stream_sequence),
            acks: Arc::clone(acks),
        })
    }

    /// Handler that outlasts every shutdown in these tests, like a grace period.
    struct StalledHandler;

    #[async_trait::async_trait]
    impl MessageHandler for StalledHandler {
        async fn handle(&self, _metadata: &DeliveryMetadata) -> Disposition {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Disposition::Ack
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn shutdown_after(shutdown: &ShutdownCoordinator, delay: Duration, reason: ShutdownReason) {
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.shutdown(reason);
        });
    }

    #[tokio::test]
    async fn test_metadata_failure_naks_without_calling_handler() {
        let mut handler = MockMessageHandler::new();
        handler.expect_handle().never();

        let mut acker = MockAcknowledger::new();
        acker.expect_nak().times(1).returning(|| Ok(()));
        acker.expect_ack().never();

        let disposition = dispatch(
            &handler,
            Err(NatsError::metadata_error("not a jetstream message")),
            &acker,
            &metrics(),
        )
        .await;

        assert_eq!(disposition, Disposition::Nak);
    }

    #[tokio::test]
    async fn test_failed_nak_after_metadata_failure_is_swallowed() {
        let mut handler = MockMessageHandler::new();
        handler.expect_handle().never();

        let mut acker = MockAcknowledger::new();
        acker
            .expect_nak()
            .times(1)
            .returning(|| Err(NatsError::ack_error("connection closed")));

        let disposition = dispatch(
            &handler,
            Err(NatsError::metadata_error("bad reply subject")),
            &acker,
            &metrics(),
        )
        .await;

        assert_eq!(disposition, Disposition::Nak);
    }

    #[tokio::test]
    async fn test_ack_disposition_sends_single_ack() {
        let mut handler = MockMessageHandler::new();
        handler
            .expect_handle()
            .withf(|metadata| metadata.stream_sequence == 3)
            .times(1)
            .returning(|_| Disposition::Ack);

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().times(1).returning(|| Ok(()));
        acker.expect_nak().never();

        let disposition = dispatch(&handler, Ok(metadata(3)), &acker, &metrics()).await;
        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_ack_failure_is_not_retried() {
        let mut handler = MockMessageHandler::new();
        handler.expect_handle().returning(|_| Disposition::Ack);

        let mut acker = MockAcknowledger::new();
        acker
            .expect_ack()
            .times(1)
            .returning(|| Err(NatsError::ack_error("timed out")));
        acker.expect_nak().never();

        let disposition = dispatch(&handler, Ok(metadata(4)), &acker, &metrics()).await;
        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_leave_disposition_sends_nothing() {
        let mut handler = MockMessageHandler::new();
        handler.expect_handle().times(1).returning(|_| Disposition::Leave);

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().never();
        acker.expect_nak().never();

        let disposition = dispatch(&handler, Ok(metadata(10)), &acker, &metrics()).await;
        assert_eq!(disposition, Disposition::Leave);
    }

    #[tokio::test]
    async fn test_nak_disposition_sends_single_nak() {
        let mut handler = MockMessageHandler::new();
        handler.expect_handle().returning(|_| Disposition::Nak);

        let mut acker = MockAcknowledger::new();
        acker.expect_nak().times(1).returning(|| Ok(()));
        acker.expect_ack().never();

        let disposition = dispatch(&handler, Ok(metadata(5)), &acker, &metrics()).await;
        assert_eq!(disposition, Disposition::Nak);
    }

    #[tokio::test]
    async fn test_message_without_id_is_still_handled() {
        let mut handler = MockMessageHandler::new();
        handler
            .expect_handle()
            .withf(|metadata| metadata.message_id().is_none())
            .times(1)
            .returning(|_| Disposition::Ack);

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().times(1).returning(|| Ok(()));

        let mut without_id = metadata(1);
        without_id.message_ids.clear();

        let disposition = dispatch(&handler, Ok(without_id), &acker, &metrics()).await;
        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_receive_errors_do_not_stop_consumption() {
        let acks = Arc::new(AtomicUsize::new(0));
        let messages = stream::iter(vec![
            Err("missed heartbeat"),
            delivery(1, &acks),
            Err("no responders"),
            delivery(2, &acks),
        ]);

        let mut handler = MockMessageHandler::new();
        handler.expect_handle().times(2).returning(|_| Disposition::Ack);
        handler.expect_name().return_const("mock");

        let shutdown = ShutdownCoordinator::new();
        let result = consume(messages, &handler, &shutdown, &metrics()).await;

        assert!(matches!(result, Err(NatsError::Messages(_))));
        assert_eq!(acks.load(Ordering::SeqCst), 2);
        assert!(!shutdown.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_slow_handler_ends_consumption() {
        let acks = Arc::new(AtomicUsize::new(0));
        let messages = stream::iter(vec![delivery(10, &acks)]).chain(stream::pending());

        let shutdown = ShutdownCoordinator::new();
        shutdown_after(&shutdown, Duration::from_secs(1), ShutdownReason::Interrupt);

        let start = Instant::now();
        let reason = consume(messages, &StalledHandler, &shutdown, &metrics())
            .await
            .unwrap();

        assert_eq!(reason, ShutdownReason::Interrupt);
        assert!(start.elapsed() < Duration::from_secs(60));
        // The in-flight dispatch was dropped before it could ack
        assert_eq!(acks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_waiting_for_messages() {
        let messages = stream::pending::<Received>();

        let mut handler = MockMessageHandler::new();
        handler.expect_handle().never();

        let shutdown = ShutdownCoordinator::new();
        shutdown_after(&shutdown, Duration::from_secs(5), ShutdownReason::Terminate);

        let reason = consume(messages, &handler, &shutdown, &metrics())
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::Terminate);
    }

    #[tokio::test]
    async fn test_first_shutdown_reason_is_returned() {
        let messages = stream::pending::<Received>();
        let handler = MockMessageHandler::new();

        let shutdown = ShutdownCoordinator::new();
        shutdown.shutdown(ShutdownReason::MessageBudgetReached);
        shutdown.shutdown(ShutdownReason::Interrupt);

        let reason = consume(messages, &handler, &shutdown, &metrics())
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::MessageBudgetReached);
    }
}
