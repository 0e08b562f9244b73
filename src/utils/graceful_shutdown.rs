use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use eyre::{Result, WrapErr};
use tokio::{signal, sync::broadcast, time::Instant};

use crate::metrics;

/// Why the server is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Triggered from inside the process
    Requested,
}

/// Turns OS signals into a one-shot broadcast and waits for in-flight provisioning runs.
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<ShutdownReason>,
    shutdown_initiated: Arc<AtomicBool>,
    /// Upper bound on how long [`GracefulShutdown::drain`] waits
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            shutdown_tx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            drain_timeout,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    /// Start shutdown. Only the first call broadcasts; later calls are ignored.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!(reason = ?reason, "Shutdown initiated");
            if self.shutdown_tx.send(reason).is_err() {
                tracing::debug!("No shutdown subscribers");
            }
        } else {
            tracing::warn!(reason = ?reason, "Shutdown already initiated, ignoring signal");
        }
    }

    /// Wait for SIGINT or SIGTERM and trigger shutdown.
    pub async fn run_signal_handler(&self) -> Result<()> {
        #[cfg(unix)]
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to register SIGTERM handler")?;

        tracing::info!("Listening for SIGINT and SIGTERM");

        #[cfg(unix)]
        let reason = tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to listen for Ctrl+C")?;
                ShutdownReason::Interrupt
            }
            _ = sigterm.recv() => ShutdownReason::Terminate,
        };

        #[cfg(not(unix))]
        let reason = {
            signal::ctrl_c()
                .await
                .wrap_err("Failed to listen for Ctrl+C")?;
            ShutdownReason::Interrupt
        };

        self.trigger_shutdown(reason);
        Ok(())
    }

    /// Resolve once shutdown has been triggered. Usable as the future passed to
    /// `axum::serve(..).with_graceful_shutdown`.
    pub async fn wait_for_shutdown_signal(&self) -> ShutdownReason {
        let mut receiver = self.subscribe();
        if self.is_shutdown_initiated() {
            return ShutdownReason::Requested;
        }
        match receiver.recv().await {
            Ok(reason) => reason,
            Err(_) => {
                tracing::warn!("Shutdown channel closed unexpectedly");
                ShutdownReason::Requested
            }
        }
    }

    /// Wait until no provisioning run is in flight, or the drain timeout passes.
    ///
    /// Returns the number of runs still active when it gave up (0 on a clean drain).
    pub async fn drain(&self) -> i64 {
        let deadline = Instant::now() + self.drain_timeout;
        loop {
            let active = metrics::active_provisions();
            if active <= 0 {
                return 0;
            }
            if Instant::now() >= deadline {
                tracing::error!(
                    active,
                    timeout = ?self.drain_timeout,
                    "Provisioning runs still active at shutdown"
                );
                return active;
            }
            tracing::info!(active, "Waiting for provisioning runs to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
