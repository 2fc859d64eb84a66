//! Message handler trait.

use crate::metadata::DeliveryMetadata;
use async_trait::async_trait;

/// What to do with a delivery once the handler has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: the broker will not redeliver.
    Ack,
    /// Negative acknowledge: the broker redelivers immediately.
    Nak,
    /// Neither: the broker redelivers after the consumer's ack wait,
    /// until max deliver is reached.
    Leave,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Nak => "nak",
            Disposition::Leave => "leave",
        }
    }
}

/// Handler invoked once per delivered message.
///
/// The handler only decides. Sending the ack or nak is the worker's job, so
/// implementations never touch the broker.
///
/// # Example
///
/// ```rust,ignore
/// use nats_consumer::{DeliveryMetadata, Disposition, MessageHandler};
///
/// struct AckEverything;
///
/// #[async_trait::async_trait]
/// impl MessageHandler for AckEverything {
///     async fn handle(&self, _metadata: &DeliveryMetadata) -> Disposition {
///         Disposition::Ack
///     }
///
///     fn name(&self) -> &'static str {
///         "ack_everything"
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Decide the disposition of one delivery.
    async fn handle(&self, metadata: &DeliveryMetadata) -> Disposition;

    /// Handler name, used in logs.
    fn name(&self) -> &'static str;
}
