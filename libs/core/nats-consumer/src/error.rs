//! Error types for the NATS consumer.

use thiserror::Error;

/// Error that can occur while consuming from JetStream.
#[derive(Debug, Error)]
pub enum NatsError {
    /// NATS connection error
    #[error("NATS connection error: {0}")]
    Connection(#[from] async_nats::ConnectError),

    /// Stream not found
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Consumer not found
    #[error("Consumer not found: {0}")]
    ConsumerNotFound(String),

    /// JetStream error
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Error opening or reading the message stream
    #[error("Message stream error: {0}")]
    Messages(String),

    /// Delivery metadata could not be read from the reply subject
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Ack or nak could not be sent
    #[error("Ack error: {0}")]
    Ack(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NatsError {
    /// Create a JetStream error from an async_nats error.
    pub fn from_jetstream_error(error: impl std::fmt::Display) -> Self {
        Self::JetStream(error.to_string())
    }

    /// Create an ack error.
    pub fn ack_error(error: impl std::fmt::Display) -> Self {
        Self::Ack(error.to_string())
    }

    /// Create a metadata error.
    pub fn metadata_error(error: impl std::fmt::Display) -> Self {
        Self::Metadata(error.to_string())
    }
}
