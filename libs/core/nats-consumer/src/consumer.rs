//! Connection to NATS and lookup of an existing durable JetStream consumer.

use crate::config::ConsumerConfig;
use crate::error::NatsError;
use crate::metadata::DeliveryMetadata;
use async_nats::jetstream::consumer::pull::{Config as PullConfig, Stream as MessageStream};
use async_nats::jetstream::consumer::Consumer;
use async_nats::jetstream::{AckKind, Context, Message};
use async_nats::Client;
use async_trait::async_trait;
use tracing::{debug, info};

/// Handle on a JetStream context bound to one stream/consumer pair.
///
/// The stream and the consumer are looked up, never created.
pub struct NatsConsumer {
    client: Client,
    jetstream: Context,
    config: ConsumerConfig,
}

impl NatsConsumer {
    /// Connect to the configured server and open a JetStream context.
    pub async fn connect(config: ConsumerConfig) -> Result<Self, NatsError> {
        config.validate()?;

        info!(
            server = %config.server_url,
            name = %config.connection_name,
            "Connecting to NATS"
        );

        let client = async_nats::ConnectOptions::new()
            .name(&config.connection_name)
            .connect(config.server_url.as_str())
            .await?;

        info!("Connected to NATS");

        Ok(Self::from_client(client, config))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client, config: ConsumerConfig) -> Self {
        let jetstream = async_nats::jetstream::new(client.clone());
        Self {
            client,
            jetstream,
            config,
        }
    }

    /// Get the stream name.
    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Get the consumer name.
    pub fn consumer_name(&self) -> &str {
        &self.config.consumer_name
    }

    /// Look up the durable consumer on its stream.
    pub async fn lookup(&self) -> Result<Consumer<PullConfig>, NatsError> {
        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| {
                NatsError::StreamNotFound(format!("{}: {}", self.config.stream_name, e))
            })?;

        let consumer = stream
            .get_consumer::<PullConfig>(&self.config.consumer_name)
            .await
            .map_err(|e| {
                NatsError::ConsumerNotFound(format!(
                    "{}/{}: {}",
                    self.config.stream_name, self.config.consumer_name, e
                ))
            })?;

        let info = consumer.cached_info();
        debug!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            max_deliver = info.config.max_deliver,
            ack_wait_ms = info.config.ack_wait.as_millis(),
            num_pending = info.num_pending,
            "Consumer found"
        );

        Ok(consumer)
    }

    /// Open the continuous message stream for a consumer.
    pub async fn messages(
        &self,
        consumer: &Consumer<PullConfig>,
    ) -> Result<MessageStream, NatsError> {
        consumer
            .messages()
            .await
            .map_err(|e| NatsError::Messages(e.to_string()))
    }

    /// Flush pending acks to the server.
    pub async fn flush(&self) -> Result<(), NatsError> {
        self.client
            .flush()
            .await
            .map_err(NatsError::from_jetstream_error)
    }
}

/// Sends acknowledgements for one delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Acknowledge the delivery.
    async fn ack(&self) -> Result<(), NatsError>;

    /// Negatively acknowledge the delivery, requesting immediate redelivery.
    async fn nak(&self) -> Result<(), NatsError>;
}

#[async_trait]
impl Acknowledger for Message {
    async fn ack(&self) -> Result<(), NatsError> {
        Message::ack(self).await.map_err(NatsError::ack_error)
    }

    async fn nak(&self) -> Result<(), NatsError> {
        self.ack_with(AckKind::Nak(None))
            .await
            .map_err(NatsError::ack_error)
    }
}

/// One delivery from a consumer: its metadata plus the means to ack it.
pub trait Delivery: Acknowledger {
    /// Read the delivery's JetStream metadata.
    fn metadata(&self) -> Result<DeliveryMetadata, NatsError>;
}

impl Delivery for Message {
    fn metadata(&self) -> Result<DeliveryMetadata, NatsError> {
        DeliveryMetadata::from_message(self)
    }
}
