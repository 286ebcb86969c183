//! Control context: a dedicated thread running a single-threaded runtime.
//!
//! All bus I/O, command dispatch and the update hook run here. The runtime
//! is current-thread so every control task stays on the pinned core.

use std::future::Future;
use std::io;
use std::thread::{self, JoinHandle};

use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::priority::apply_core_placement;

/// Handle to the running control thread.
pub struct ControlRuntime {
    cancel: CancellationToken,
    /// None after shutdown.
    thread: Option<JoinHandle<()>>,
}

impl ControlRuntime {
    /// Starts the control thread and runs the future built by `make_task` on
    /// it until that future completes.
    ///
    /// The future is constructed on the control thread, so it need not be
    /// `Send`. It is expected to observe `cancel` and return promptly.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread fails to spawn or the runtime fails to
    /// build.
    pub fn spawn<F, Fut>(
        core: Option<usize>,
        cancel: CancellationToken,
        make_task: F,
    ) -> io::Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name("control".into())
            .spawn(move || {
                apply_core_placement("Control", core);

                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                if tx.send(Ok(())).is_err() {
                    log::error!("[Control] Failed to report startup");
                    return;
                }

                runtime.block_on(make_task());
                log::info!("[Control] Runtime stopped");
            })?;

        rx.blocking_recv()
            .map_err(|_| io::Error::other("control thread exited during startup"))??;

        log::info!("[Control] Runtime started");

        Ok(Self {
            cancel,
            thread: Some(thread),
        })
    }

    /// Returns `true` once the control task has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the control task and waits for the thread to exit.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();

        if let Some(thread) = self.thread.take() {
            if let Err(e) = thread.join() {
                log::error!("[Control] Thread panicked: {:?}", e);
            } else {
                log::info!("[Control] Shutdown complete");
            }
        }
    }
}

impl Drop for ControlRuntime {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}
