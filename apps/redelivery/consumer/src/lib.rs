//! Redelivery Consumer
//!
//! Attaches to an existing JetStream durable consumer and fails every tenth
//! message (by stream sequence) so the broker's redelivery and max-deliver
//! behaviour can be observed.
//!
//! ## Flow
//!
//! ```text
//! NATS JetStream (existing stream + durable consumer)
//!   ↓ (continuous pull)
//! NatsWorker<FailEveryTenth>
//!   ↓ stream_seq % 10 != 0 → ack
//!   ↓ stream_seq % 10 == 0 → leave unacked (redelivered after ack wait)
//!   ↓ last message on its final delivery → grace period → shutdown
//! ```

pub mod cli;
pub mod handler;

use crate::cli::Args;
use crate::handler::FailEveryTenth;
use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use eyre::{Result, WrapErr};
use nats_consumer::{NatsConsumer, NatsWorker, ShutdownCoordinator, ShutdownReason};
use tracing::{error, info};

/// Run the consumer with flags from the command line.
///
/// Sets up color-eyre and tracing (JSON for production, pretty otherwise)
/// before parsing flags.
pub async fn run() -> Result<()> {
    install_color_eyre();
    let environment = Environment::from_env();
    init_tracing(&environment);

    let args = Args::parse();
    run_with(args).await?;
    Ok(())
}

/// Run the consumer until a signal arrives or the handler ends the run.
///
/// # Errors
///
/// Returns an error if:
/// - the NATS connection fails
/// - the stream or the durable consumer does not exist
/// - the message stream cannot be opened or ends unexpectedly
/// - the metrics exporter cannot be installed
pub async fn run_with(args: Args) -> Result<ShutdownReason> {
    info!(
        server = %args.server,
        stream = %args.stream,
        consumer = %args.consumer,
        msgs = args.msgs,
        max_deliver = args.max_deliver,
        grace_period = ?args.grace_period,
        "Consumer started, connecting to NATS"
    );

    if let Some(port) = args.metrics_port {
        let addr = nats_consumer::init_metrics(port).wrap_err("Failed to start metrics exporter")?;
        info!(addr = %addr, "Prometheus metrics exporter listening");
    }

    let consumer = NatsConsumer::connect(args.consumer_config())
        .await
        .wrap_err_with(|| format!("Failed to connect to NATS at {}", args.server))?;

    let shutdown = ShutdownCoordinator::new();
    let handler = FailEveryTenth::from_args(&args, shutdown.clone());
    let worker = NatsWorker::new(consumer, handler, shutdown.clone())
        .with_expected_max_deliver(args.max_deliver);

    let signals = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        if let Err(e) = signals.wait_for_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
    });

    let result = worker.run().await;
    signal_task.abort();

    let reason = result
        .wrap_err_with(|| format!("Consumer {}/{} failed", args.stream, args.consumer))?;

    info!(signal = %reason, "Exit signal received, exiting");
    Ok(reason)
}
