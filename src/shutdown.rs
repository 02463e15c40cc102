//! Graceful shutdown handling.
//!
//! This module provides:
//! - Signal handling (SIGTERM, SIGINT, SIGHUP, Ctrl+C)
//! - Stopping the context refresh schedules
//! - Waiting for in-flight loads with a configurable timeout

use crate::constants::DEFAULT_DRAIN_TIMEOUT;
use crate::context::ContextRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Shutdown signal that can be awaited.
#[derive(Clone)]
pub struct ShutdownSignal {
    /// Receiver for shutdown notification.
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn recv(&mut self) {
        let _ = self.receiver.wait_for(|&v| v).await;
    }

    /// Check if shutdown has been signaled without blocking.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Controller for managing graceful shutdown.
pub struct ShutdownController {
    /// Sender to notify all listeners of shutdown.
    sender: watch::Sender<bool>,

    /// Flag indicating shutdown in progress.
    shutting_down: Arc<AtomicBool>,

    /// Broadcast sender for shutdown phase notifications.
    phase_sender: broadcast::Sender<ShutdownPhase>,

    /// How long to wait for in-flight table loads.
    drain_timeout: Duration,
}

/// Shutdown phases for coordinated cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Shutdown has been initiated.
    Initiated,

    /// Cancelling refresh schedules and waiting for running loads.
    StoppingRefreshes,

    /// Closing database connections.
    ClosingConnections,

    /// Final cleanup complete.
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Initiated => write!(f, "initiated"),
            ShutdownPhase::StoppingRefreshes => write!(f, "stopping_refreshes"),
            ShutdownPhase::ClosingConnections => write!(f, "closing_connections"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

impl ShutdownController {
    /// Create a new shutdown controller with the default drain timeout.
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Create a shutdown controller with a custom drain timeout.
    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        let (sender, _) = watch::channel(false);
        let (phase_sender, _) = broadcast::channel(16);

        Self {
            sender,
            shutting_down: Arc::new(AtomicBool::new(false)),
            phase_sender,
            drain_timeout,
        }
    }

    /// Get a shutdown signal receiver.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to shutdown phase notifications.
    pub fn subscribe_phases(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.phase_sender.subscribe()
    }

    /// Check if shutdown is in progress.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Only the first call has an effect.
    pub fn shutdown(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Initiating graceful shutdown...");
            let _ = self.sender.send(true);
            let _ = self.phase_sender.send(ShutdownPhase::Initiated);
        }
    }

    fn notify_phase(&self, phase: ShutdownPhase) {
        info!("Shutdown phase: {}", phase);
        let _ = self.phase_sender.send(phase);
    }

    /// Stop the registry and wait for its refresh tasks.
    ///
    /// Loads already running are allowed to finish within the drain
    /// timeout. The connection pool closes when the server is dropped.
    pub async fn graceful_shutdown(&self, registry: &ContextRegistry) {
        self.shutdown();

        self.notify_phase(ShutdownPhase::StoppingRefreshes);
        registry.shutdown();
        if tokio::time::timeout(self.drain_timeout, registry.wait_stopped())
            .await
            .is_err()
        {
            warn!(
                "Refresh tasks still running after {:?}, continuing shutdown",
                self.drain_timeout
            );
        }

        self.notify_phase(ShutdownPhase::ClosingConnections);

        self.notify_phase(ShutdownPhase::Complete);
        info!("Graceful shutdown complete");
    }

    /// Get the drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared shutdown controller type.
pub type SharedShutdownController = Arc<ShutdownController>;

/// Create a new shared shutdown controller.
pub fn new_shutdown_controller() -> SharedShutdownController {
    Arc::new(ShutdownController::new())
}

/// Create a shared shutdown controller from configuration.
pub fn new_shutdown_controller_with_config(config: &ShutdownConfig) -> SharedShutdownController {
    Arc::new(ShutdownController::with_drain_timeout(config.drain_timeout))
}

/// Install signal handlers for graceful shutdown.
///
/// This sets up handlers for:
/// - SIGINT (Ctrl+C)
/// - SIGTERM and SIGHUP (Unix)
///
/// When a signal is received, the shutdown controller is triggered.
pub async fn install_signal_handlers(controller: SharedShutdownController) {
    let ctrl_c_controller = controller.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c_controller.shutdown();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name) in [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::hangup(), "SIGHUP"),
        ] {
            let controller = controller.clone();
            tokio::spawn(async move {
                match signal(kind) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("Received {}, initiating shutdown...", name);
                        controller.shutdown();
                    }
                    Err(e) => {
                        error!("Failed to install {} handler: {}", name, e);
                    }
                }
            });
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Timeout for in-flight table loads to finish.
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ShutdownConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(drain) = std::env::var("CONTEXT_SHUTDOWN_DRAIN_TIMEOUT") {
            if let Ok(secs) = drain.parse::<u64>() {
                config.drain_timeout = Duration::from_secs(secs);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{loader_fn, TableData, TableSpec};
    use serial_test::serial;

    #[test]
    fn test_shutdown_controller_creation() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutting_down());
        assert_eq!(controller.drain_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_shutdown_signal() {
        let controller = ShutdownController::new();
        let signal = controller.signal();

        assert!(!signal.is_shutdown());

        controller.shutdown();
        assert!(controller.is_shutting_down());
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_shutdown_idempotent() {
        let controller = ShutdownController::new();

        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_graceful_shutdown_stops_registry() {
        let controller = new_shutdown_controller();
        let mut phases = controller.subscribe_phases();
        let registry = ContextRegistry::new();
        registry
            .register(
                TableSpec::new("t", Duration::from_secs(60), Duration::from_secs(1)),
                loader_fn("empty", || async { Ok(TableData::new()) }),
            )
            .await
            .unwrap();

        controller.graceful_shutdown(&registry).await;

        assert!(controller.is_shutting_down());
        assert!(registry.is_shut_down());
        let mut seen = Vec::new();
        while let Ok(phase) = phases.try_recv() {
            seen.push(phase);
        }
        assert_eq!(
            seen,
            [
                ShutdownPhase::Initiated,
                ShutdownPhase::StoppingRefreshes,
                ShutdownPhase::ClosingConnections,
                ShutdownPhase::Complete,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_in_flight_load() {
        let controller = ShutdownController::with_drain_timeout(Duration::from_secs(30));
        let registry = Arc::new(ContextRegistry::new());
        registry
            .register(
                TableSpec::new("slow", Duration::from_secs(60), Duration::from_secs(5)),
                loader_fn("slow", || async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    let mut data = TableData::new();
                    data.insert("k".to_string(), serde_json::json!(1));
                    Ok(data)
                }),
            )
            .await
            .unwrap();

        // Registration takes 3s, so the first scheduled load runs from 8s to 11s.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(registry.list_tables()[0].refreshing);

        controller.graceful_shutdown(&registry).await;
        let info = &registry.list_tables()[0];
        assert!(!info.refreshing);
        assert_eq!(info.refresh_count, 2);
    }

    #[test]
    #[serial]
    fn test_shutdown_config_from_env() {
        std::env::set_var("CONTEXT_SHUTDOWN_DRAIN_TIMEOUT", "3");
        assert_eq!(ShutdownConfig::from_env().drain_timeout, Duration::from_secs(3));
        std::env::remove_var("CONTEXT_SHUTDOWN_DRAIN_TIMEOUT");
        assert_eq!(ShutdownConfig::from_env().drain_timeout, DEFAULT_DRAIN_TIMEOUT);
    }

    #[test]
    fn test_shutdown_phase_display() {
        assert_eq!(ShutdownPhase::Initiated.to_string(), "initiated");
        assert_eq!(
            ShutdownPhase::StoppingRefreshes.to_string(),
            "stopping_refreshes"
        );
        assert_eq!(
            ShutdownPhase::ClosingConnections.to_string(),
            "closing_connections"
        );
        assert_eq!(ShutdownPhase::Complete.to_string(), "complete");
    }
}
