//! Audio context: a dedicated OS thread that keeps the engine fed.
//!
//! The pump does nothing but call [`AudioEngine::tick`](crate::playback::AudioEngine::tick)
//! in a loop. It never touches the bus or the dispatcher, so slow broker
//! I/O on the control context cannot starve audio output.

use std::io;
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;

use super::priority::{apply_core_placement, raise_thread_priority};
use crate::playback::{EngineActivity, SharedEngine};
use crate::protocol_constants::AUDIO_IDLE_BACKOFF;

/// Handle to the running audio pump thread.
pub struct AudioPump {
    cancel: CancellationToken,
    /// None after shutdown.
    thread: Option<JoinHandle<()>>,
}

impl AudioPump {
    /// Starts the pump on a new elevated-priority thread.
    ///
    /// # Arguments
    /// * `engine` - Engine shared with the playback driver
    /// * `core` - CPU core to pin the thread to, if any
    /// * `nice` - Nice level for the thread (0 keeps normal priority)
    /// * `cancel` - Stops the pump when cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if the thread fails to spawn. Pinning and priority
    /// failures are logged but don't cause errors.
    pub fn spawn(
        engine: SharedEngine,
        core: Option<usize>,
        nice: i32,
        cancel: CancellationToken,
    ) -> io::Result<Self> {
        let cancel_clone = cancel.clone();

        let thread = thread::Builder::new()
            .name("audio-pump".into())
            .spawn(move || {
                apply_core_placement("Audio", core);
                raise_thread_priority(nice);
                log::info!("[AudioPump] Running");

                while !cancel_clone.is_cancelled() {
                    // Lock per tick so control calls interleave between ticks.
                    let activity = engine.lock().tick();
                    if activity == EngineActivity::Idle {
                        thread::sleep(AUDIO_IDLE_BACKOFF);
                    }
                }

                log::info!("[AudioPump] Stopped");
            })?;

        Ok(Self {
            cancel,
            thread: Some(thread),
        })
    }

    /// Stops the pump and waits for the thread to exit.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();

        if let Some(thread) = self.thread.take() {
            if let Err(e) = thread.join() {
                log::error!("[AudioPump] Thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for AudioPump {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}
