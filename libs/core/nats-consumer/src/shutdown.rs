use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Why the process is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// The handler saw the last expected message at its final delivery.
    MessageBudgetReached,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminated"),
            ShutdownReason::MessageBudgetReached => write!(f, "message budget reached"),
        }
    }
}

/// Shutdown coordinator shared by the signal listener, the worker loop and
/// handlers that may end the run themselves.
///
/// This handles:
/// - Signal reception (SIGTERM, SIGINT)
/// - Internally triggered shutdown
/// - Broadcasting the first reason to every subscriber
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
    /// Flag indicating if shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.tx.subscribe()
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    /// The reason shutdown was initiated with, if it has been.
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// Initiate shutdown and notify all subscribers.
    ///
    /// Only the first call has an effect. Returns whether this call was it.
    pub fn shutdown(&self, reason: ShutdownReason) -> bool {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!(reason = %reason, "Initiating shutdown");
            self.tx.send_replace(Some(reason));
            true
        } else {
            false
        }
    }

    /// Wait until shutdown has been initiated and return its reason.
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // The sender lives in `self`, so this cannot close while we wait.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Wait for SIGINT, SIGTERM or an internal trigger, whichever comes first.
    ///
    /// Signals initiate shutdown with the matching reason. The returned reason
    /// is the one that won.
    pub async fn wait_for_signal(&self) -> std::io::Result<ShutdownReason> {
        #[cfg(unix)]
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        #[cfg(unix)]
        let terminate = sigterm.recv();

        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C)");
                self.shutdown(ShutdownReason::Interrupt);
            },
            _ = terminate => {
                info!("Received SIGTERM");
                self.shutdown(ShutdownReason::Terminate);
            },
            _ = self.wait() => {},
        }

        Ok(self.reason().unwrap_or(ShutdownReason::Interrupt))
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
