//! Prometheus metrics for the NATS consumer.

use crate::error::NatsError;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Counters for one stream/consumer pair.
#[derive(Clone)]
pub struct ConsumerMetrics {
    stream_name: String,
    consumer_name: String,
}

impl ConsumerMetrics {
    /// Create new metrics.
    pub fn new(stream_name: &str, consumer_name: &str) -> Self {
        Self {
            stream_name: stream_name.to_string(),
            consumer_name: consumer_name.to_string(),
        }
    }

    /// Record a message received.
    pub fn message_received(&self, redelivery: bool) {
        counter!(
            "nats_consumer_messages_received_total",
            "stream" => self.stream_name.clone(),
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);

        if redelivery {
            counter!(
                "nats_consumer_redeliveries_total",
                "stream" => self.stream_name.clone(),
                "consumer" => self.consumer_name.clone()
            )
            .increment(1);
        }
    }

    /// Record a message acknowledged.
    pub fn message_acked(&self) {
        counter!(
            "nats_consumer_messages_acked_total",
            "stream" => self.stream_name.clone(),
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);
    }

    /// Record a message negatively acknowledged.
    pub fn message_naked(&self) {
        counter!(
            "nats_consumer_messages_naked_total",
            "stream" => self.stream_name.clone(),
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);
    }

    /// Record a message left for ack-wait redelivery.
    pub fn message_left(&self) {
        counter!(
            "nats_consumer_messages_left_total",
            "stream" => self.stream_name.clone(),
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);
    }

    /// Record a failed ack or nak.
    pub fn ack_failed(&self, kind: &'static str) {
        counter!(
            "nats_consumer_ack_failures_total",
            "stream" => self.stream_name.clone(),
            "consumer" => self.consumer_name.clone(),
            "kind" => kind
        )
        .increment(1);
    }

    /// Record a message whose metadata could not be read.
    pub fn metadata_failed(&self) {
        counter!(
            "nats_consumer_metadata_failures_total",
            "stream" => self.stream_name.clone(),
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);
    }
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> Result<SocketAddr, NatsError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| NatsError::Config(format!("failed to install metrics exporter: {e}")))?;
    Ok(addr)
}
