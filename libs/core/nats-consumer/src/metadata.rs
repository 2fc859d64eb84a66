//! Delivery metadata extracted from a JetStream message.

use crate::error::NatsError;
use async_nats::header::{HeaderMap, NATS_MESSAGE_ID};

/// Owned snapshot of a delivery's JetStream metadata.
///
/// Built from the ack reply subject, so it is only available for messages
/// delivered through a JetStream consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
    /// Stream name.
    pub stream: String,
    /// Consumer name.
    pub consumer: String,
    /// Position in the stream's log.
    pub stream_sequence: u64,
    /// Position in this consumer's delivery sequence.
    pub consumer_sequence: u64,
    /// Delivery attempt, starting at 1.
    pub delivered: u64,
    /// Messages still pending for the consumer.
    pub pending: u64,
    /// Message subject.
    pub subject: String,
    /// Every `Nats-Msg-Id` header value on the message.
    pub message_ids: Vec<String>,
}

/// How many deduplication ids a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIdStatus {
    Missing,
    Single,
    Multiple,
}

impl DeliveryMetadata {
    /// Read the metadata of a JetStream message.
    pub fn from_message(message: &async_nats::jetstream::Message) -> Result<Self, NatsError> {
        let info = message.info().map_err(NatsError::metadata_error)?;
        let delivered = u64::try_from(info.delivered).map_err(|_| {
            NatsError::Metadata(format!("negative delivery count {}", info.delivered))
        })?;

        Ok(Self {
            stream: info.stream.to_string(),
            consumer: info.consumer.to_string(),
            stream_sequence: info.stream_sequence,
            consumer_sequence: info.consumer_sequence,
            delivered,
            pending: info.pending,
            subject: message.subject.to_string(),
            message_ids: message_ids(message.headers.as_ref()),
        })
    }

    /// First deduplication id, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.message_ids.first().map(String::as_str)
    }

    pub fn message_id_status(&self) -> MessageIdStatus {
        match self.message_ids.len() {
            0 => MessageIdStatus::Missing,
            1 => MessageIdStatus::Single,
            _ => MessageIdStatus::Multiple,
        }
    }

    /// Check if this is a redelivery.
    pub fn is_redelivery(&self) -> bool {
        self.delivered > 1
    }
}

/// Collect all `Nats-Msg-Id` values from the headers.
pub fn message_ids(headers: Option<&HeaderMap>) -> Vec<String> {
    headers
        .map(|headers| {
            headers
                .get_all(NATS_MESSAGE_ID)
                .map(|value| value.as_str().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(message_ids: Vec<&str>, delivered: u64) -> DeliveryMetadata {
        DeliveryMetadata {
            stream: "ORDERS".to_string(),
            consumer: "processor".to_string(),
            stream_sequence: 7,
            consumer_sequence: 9,
            delivered,
            pending: 0,
            subject: "orders.created".to_string(),
            message_ids: message_ids.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_message_id_status() {
        assert_eq!(metadata(vec![], 1).message_id_status(), MessageIdStatus::Missing);
        assert_eq!(metadata(vec!["a"], 1).message_id_status(), MessageIdStatus::Single);
        assert_eq!(
            metadata(vec!["a", "b"], 1).message_id_status(),
            MessageIdStatus::Multiple
        );
    }

    #[test]
    fn test_message_id_returns_first() {
        assert_eq!(metadata(vec![], 1).message_id(), None);
        assert_eq!(metadata(vec!["a", "b"], 1).message_id(), Some("a"));
    }

    #[test]
    fn test_is_redelivery() {
        assert!(!metadata(vec!["a"], 1).is_redelivery());
        assert!(metadata(vec!["a"], 2).is_redelivery());
    }

    #[test]
    fn test_message_ids_from_headers() {
        assert!(message_ids(None).is_empty());

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "application/json");
        assert!(message_ids(Some(&headers)).is_empty());

        headers.insert(NATS_MESSAGE_ID, "order-1");
        assert_eq!(message_ids(Some(&headers)), vec!["order-1".to_string()]);

        headers.append(NATS_MESSAGE_ID, "order-1-dup");
        assert_eq!(
            message_ids(Some(&headers)),
            vec!["order-1".to_string(), "order-1-dup".to_string()]
        );
    }
}
