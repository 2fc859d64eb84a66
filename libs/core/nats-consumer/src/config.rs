//! Configuration for attaching to an existing JetStream consumer.

use crate::error::NatsError;

/// Default NATS server address.
pub const DEFAULT_SERVER_URL: &str = "nats://127.0.0.1:4222";

/// Connection name reported to the server when none is set.
pub const DEFAULT_CONNECTION_NAME: &str = "nats-consumer";

/// Consumer configuration.
///
/// Both the stream and the durable consumer must already exist on the
/// server. Nothing here is used to create them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// NATS server URL
    pub server_url: String,

    /// JetStream stream name
    pub stream_name: String,

    /// Durable consumer name
    pub consumer_name: String,

    /// Client connection name
    pub connection_name: String,
}

impl ConsumerConfig {
    /// Create a configuration for the given stream and consumer on the default server.
    pub fn new(stream_name: impl Into<String>, consumer_name: impl Into<String>) -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            stream_name: stream_name.into(),
            consumer_name: consumer_name.into(),
            connection_name: DEFAULT_CONNECTION_NAME.to_string(),
        }
    }

    /// Set the server URL.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Set the client connection name.
    pub fn with_connection_name(mut self, connection_name: impl Into<String>) -> Self {
        self.connection_name = connection_name.into();
        self
    }

    /// Reject configurations that can never resolve to a consumer.
    pub fn validate(&self) -> Result<(), NatsError> {
        if self.server_url.trim().is_empty() {
            return Err(NatsError::Config("server URL must not be empty".to_string()));
        }
        if self.stream_name.trim().is_empty() {
            return Err(NatsError::Config("stream name must not be empty".to_string()));
        }
        if self.consumer_name.trim().is_empty() {
            return Err(NatsError::Config(
                "consumer name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let config = ConsumerConfig::new("ORDERS", "processor");
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.stream_name, "ORDERS");
        assert_eq!(config.consumer_name, "processor");
        assert_eq!(config.connection_name, DEFAULT_CONNECTION_NAME);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConsumerConfig::new("ORDERS", "processor")
            .with_server_url("nats://broker:4222")
            .with_connection_name("redelivery-consumer");
        assert_eq!(config.server_url, "nats://broker:4222");
        assert_eq!(config.connection_name, "redelivery-consumer");
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        assert!(ConsumerConfig::new("ORDERS", "processor").validate().is_ok());

        let err = ConsumerConfig::new("", "processor").validate().unwrap_err();
        assert!(err.to_string().contains("stream name"));

        let err = ConsumerConfig::new("ORDERS", "  ").validate().unwrap_err();
        assert!(err.to_string().contains("consumer name"));

        let err = ConsumerConfig::new("ORDERS", "processor")
            .with_server_url("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, NatsError::Config(_)));
    }
}
