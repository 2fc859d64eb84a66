//! Command line flags.

use clap::Parser;
use nats_consumer::{ConsumerConfig, DEFAULT_SERVER_URL};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "redelivery-consumer")]
#[command(about = "Consume a JetStream durable consumer, failing every 10th message to exercise redelivery")]
pub struct Args {
    /// JetStream stream to consume
    #[arg(long, env = "NATS_STREAM")]
    pub stream: String,

    /// JetStream durable consumer to subscribe to
    #[arg(long, env = "NATS_CONSUMER")]
    pub consumer: String,

    /// Number of messages to consume (stream sequence of the last expected message)
    #[arg(long, default_value_t = 100)]
    pub msgs: u64,

    /// Maximum number of delivery attempts configured on the consumer
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_deliver: u64,

    /// Grace period to wait before exiting once the last message hit its final delivery
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    pub grace_period: Duration,

    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl Args {
    /// Consumer configuration for these flags.
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig::new(&self.stream, &self.consumer)
            .with_server_url(&self.server)
            .with_connection_name("redelivery-consumer")
    }
}

/// Parse a duration such as `30s`, `250ms`, `1m30s` or `2h`.
///
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration '{input}': expected a number"));
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let millis_per_unit: u64 = match unit {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "" => return Err(format!("invalid duration '{input}': missing unit")),
            other => return Err(format!("invalid duration '{input}': unknown unit '{other}'")),
        };

        let part = if number.contains('.') {
            let value: f64 = number
                .parse()
                .map_err(|_| format!("invalid duration '{input}': bad number '{number}'"))?;
            Duration::try_from_secs_f64(value * millis_per_unit as f64 / 1_000.0)
                .map_err(|e| format!("invalid duration '{input}': {e}"))?
        } else {
            let value: u64 = number
                .parse()
                .map_err(|_| format!("invalid duration '{input}': bad number '{number}'"))?;
            let millis = value
                .checked_mul(millis_per_unit)
                .ok_or_else(|| format!("invalid duration '{input}': overflow"))?;
            Duration::from_millis(millis)
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("invalid duration '{input}': overflow"))?;
        rest = tail;
    }

    Ok(total)
}
