//! NATS JetStream consumer plumbing.
//!
//! Attaches to an existing durable consumer, hands every delivery's metadata
//! to a [`MessageHandler`] and applies the returned [`Disposition`]. Delivery
//! order, redelivery counting and ack-wait timeouts are all left to the
//! broker.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │   NATS JetStream    │────▶│   NatsWorker   │────▶│  MessageHandler  │
//! │ (existing consumer) │     │ (consume loop) │     │  (your decision) │
//! └─────────────────────┘     └────────────────┘     └──────────────────┘
//!            ▲                        │
//!            └──── ack / nak ─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nats_consumer::{ConsumerConfig, NatsConsumer, NatsWorker, ShutdownCoordinator};
//!
//! let consumer = NatsConsumer::connect(ConsumerConfig::new("ORDERS", "processor")).await?;
//! let shutdown = ShutdownCoordinator::new();
//! let worker = NatsWorker::new(consumer, AckEverything, shutdown.clone());
//!
//! tokio::spawn(async move { shutdown.wait_for_signal().await });
//! let reason = worker.run().await?;
//! ```

mod config;
mod consumer;
mod error;
mod handler;
mod metadata;
pub mod metrics;
mod shutdown;
mod worker;

pub use config::{ConsumerConfig, DEFAULT_CONNECTION_NAME, DEFAULT_SERVER_URL};
pub use consumer::{Acknowledger, Delivery, NatsConsumer};
pub use error::NatsError;
pub use handler::{Disposition, MessageHandler};
pub use metadata::{message_ids, DeliveryMetadata, MessageIdStatus};
pub use metrics::{init_metrics, ConsumerMetrics};
pub use shutdown::{ShutdownCoordinator, ShutdownReason};
pub use worker::{consume, dispatch, NatsWorker};
