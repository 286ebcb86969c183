//! Device lifecycle abstraction.
//!
//! The `SystemRestart` command does not reset the machine directly; it goes
//! through the [`Lifecycle`] trait so the core can be driven by a daemon
//! (which stops both execution contexts and re-executes itself) or by tests.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Trait for device lifecycle operations.
pub trait Lifecycle: Send + Sync {
    /// Requests a device restart.
    ///
    /// Must return promptly; the restart itself happens once both execution
    /// contexts have wound down.
    fn request_restart(&self);

    /// Requests a graceful shutdown without restart.
    fn request_shutdown(&self);
}

/// Lifecycle for the standalone daemon.
///
/// Both requests cancel the shared token that every execution context
/// observes. A restart request is additionally remembered so the binary can
/// re-execute itself after shutdown completes.
pub struct DeviceLifecycle {
    cancel_token: CancellationToken,
    restart_requested: AtomicBool,
}

impl DeviceLifecycle {
    /// Creates a lifecycle bound to the given cancellation token.
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            restart_requested: AtomicBool::new(false),
        }
    }

    /// Returns `true` if a restart was requested.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }
}

impl Lifecycle for DeviceLifecycle {
    fn request_restart(&self) {
        tracing::info!("Restart requested - stopping execution contexts");
        self.restart_requested.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    fn request_shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.cancel_token.cancel();
    }
}

/// Over-the-air firmware update hook.
///
/// Serviced once per control iteration, after the message pump. An
/// implementation must not block: it handles whatever update session is
/// pending and returns.
pub trait UpdateService: Send {
    /// Services any pending update session.
    fn service(&mut self);
}

/// Update hook for builds without an OTA channel.
#[derive(Debug, Default)]
pub struct NoopUpdateService;

impl UpdateService for NoopUpdateService {
    fn service(&mut self) {}
}
