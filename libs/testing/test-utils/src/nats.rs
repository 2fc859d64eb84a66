//! NATS test infrastructure
//!
//! Provides a `TestNats` helper that creates a NATS container with JetStream for testing.

use async_nats::header::{HeaderMap, NATS_MESSAGE_ID};
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::Client;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

// Re-export for test convenience (used by consumers of this crate)
#[allow(unused_imports)]
pub use futures::StreamExt;

/// Test NATS wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
/// JetStream is enabled so streams and durable consumers can be provisioned.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::new().await;
///
/// nats.create_stream("ORDERS", "orders.>").await;
/// nats.create_consumer("ORDERS", "processor", 3, std::time::Duration::from_secs(1)).await;
/// nats.publish_with_id("orders.created", "order-1", "{}").await;
/// # }
/// ```
pub struct TestNats {
    #[allow(dead_code)]
    container: ContainerAsync<Nats>,
    client: Client,
    pub connection_string: String,
}

impl TestNats {
    /// Create a new test NATS instance with JetStream enabled
    pub async fn new() -> Self {
        let nats_image = Nats::default().with_tag("latest").with_cmd(["-js"]);

        let container = nats_image
            .start()
            .await
            .expect("Failed to start NATS container");

        let host_port = container
            .get_host_port_ipv4(4222)
            .await
            .expect("Failed to get NATS port");

        let connection_string = format!("nats://127.0.0.1:{}", host_port);

        let client = async_nats::connect(&connection_string)
            .await
            .expect("Failed to connect to NATS");

        tracing::info!(port = host_port, "Test NATS ready with JetStream");

        Self {
            container,
            client,
            connection_string,
        }
    }

    /// Get a cloned client (useful for passing to services)
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Get a JetStream context for stream operations
    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        async_nats::jetstream::new(self.client.clone())
    }

    /// Get the connection string for manual client creation
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Create a stream capturing `subject`
    pub async fn create_stream(&self, name: &str, subject: &str) {
        self.jetstream()
            .create_stream(StreamConfig {
                name: name.to_string(),
                subjects: vec![subject.to_string()],
                ..Default::default()
            })
            .await
            .expect("Failed to create stream");
    }

    /// Create a durable pull consumer with explicit acks
    pub async fn create_consumer(
        &self,
        stream: &str,
        name: &str,
        max_deliver: i64,
        ack_wait: Duration,
    ) {
        let stream = self
            .jetstream()
            .get_stream(stream)
            .await
            .expect("Failed to get stream");

        stream
            .create_consumer(PullConfig {
                durable_name: Some(name.to_string()),
                name: Some(name.to_string()),
                ack_policy: AckPolicy::Explicit,
                max_deliver,
                ack_wait,
                ..Default::default()
            })
            .await
            .expect("Failed to create consumer");
    }

    /// Publish a message carrying a `Nats-Msg-Id` header and wait for the ack
    ///
    /// Returns the stream sequence assigned to the message.
    pub async fn publish_with_id(&self, subject: &str, id: &str, payload: &str) -> u64 {
        let mut headers = HeaderMap::new();
        headers.insert(NATS_MESSAGE_ID, id);

        self.jetstream()
            .publish_with_headers(subject.to_string(), headers, payload.to_string().into())
            .await
            .expect("Failed to publish")
            .await
            .expect("Failed to get publish ack")
            .sequence
    }
}

// Container is automatically cleaned up when TestNats is dropped
impl Drop for TestNats {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test NATS container");
    }
}
