//! Playback driver: the single entry point for engine control.
//!
//! Every operation is a direct forward to the engine except
//! [`PlaybackDriver::connect_to_stream`], which runs the mute, stop, settle,
//! connect, restore sequence so stream changes never click through the sink.

use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::SharedEngine;
use crate::bus::BusPublisher;
use crate::protocol_constants::{MAX_VOLUME, MIN_VOLUME, SETTLE_DELAY};
use crate::state::{PlaybackMode, PlaybackState};

/// Drives the shared audio engine on behalf of the command dispatcher.
///
/// Only the control context calls into the driver. The engine lock is taken
/// per step and never held across the settle delay, so the audio pump keeps
/// ticking while a connect is in progress.
pub struct PlaybackDriver {
    engine: SharedEngine,
    status: Arc<dyn BusPublisher>,
    status_topic: String,
    state: Mutex<PlaybackState>,
}

impl PlaybackDriver {
    /// Creates a driver.
    ///
    /// # Arguments
    /// * `engine` - Engine shared with the audio pump
    /// * `status` - Publisher for the connected-URL status topic
    /// * `status_topic` - Retained topic receiving each connected URL
    pub fn new(
        engine: SharedEngine,
        status: Arc<dyn BusPublisher>,
        status_topic: impl Into<String>,
    ) -> Self {
        let volume = engine.lock().volume();
        Self {
            engine,
            status,
            status_topic: status_topic.into(),
            state: Mutex::new(PlaybackState {
                volume,
                ..Default::default()
            }),
        }
    }

    /// Applies the startup volume before any command is processed.
    pub fn initialize(&self, volume: u8) {
        log::info!("[Playback] Initial volume {}", volume);
        self.engine.lock().set_volume(volume);
        *self.state.lock() = PlaybackState {
            volume,
            ..Default::default()
        };
    }

    /// Returns a snapshot of the playback state.
    pub fn state(&self) -> PlaybackState {
        self.state.lock().clone()
    }

    /// Connects the engine to a new stream without audible artifacts.
    ///
    /// Sequence: capture volume, stop, mute, settle, connect, restore volume,
    /// then publish the URL (retained) if the engine accepted it. Engine
    /// failures are not retried.
    pub async fn connect_to_stream(&self, url: &str) {
        log::info!("[Playback] Connecting to {}", url);

        let initial_volume = {
            let mut engine = self.engine.lock();
            let volume = engine.volume();
            engine.stop();
            engine.set_volume(MIN_VOLUME);
            volume
        };
        {
            let mut state = self.state.lock();
            state.url = None;
            state.mode = PlaybackMode::Stopped;
            state.volume = MIN_VOLUME;
        }

        tokio::time::sleep(SETTLE_DELAY).await;

        let connected = {
            let mut engine = self.engine.lock();
            let connected = engine.connect(url);
            engine.set_volume(initial_volume);
            connected
        };
        {
            let mut state = self.state.lock();
            state.volume = initial_volume;
            if connected {
                state.url = Some(url.to_string());
                state.mode = PlaybackMode::Running;
            }
        }

        if !connected {
            log::warn!("[Playback] Engine could not open {}", url);
            return;
        }

        if let Err(e) = self
            .status
            .publish(&self.status_topic, url.as_bytes(), true)
        {
            log::warn!(
                "[Playback] Failed to publish connected URL to {}: {}",
                self.status_topic,
                e
            );
        }
        log::info!("[Playback] Connected");
    }

    /// Toggles pause/resume.
    pub fn pause_resume(&self) {
        log::info!("[Playback] Pause/resume");
        self.engine.lock().pause_resume();

        let mut state = self.state.lock();
        state.mode = match state.mode {
            PlaybackMode::Running => PlaybackMode::Paused,
            PlaybackMode::Paused => PlaybackMode::Running,
            PlaybackMode::Stopped => PlaybackMode::Stopped,
        };
    }

    /// Stops playback.
    pub fn stop(&self) {
        log::info!("[Playback] Stop");
        self.engine.lock().stop();

        let mut state = self.state.lock();
        state.url = None;
        state.mode = PlaybackMode::Stopped;
    }

    /// Sets the engine volume; out-of-range levels are passed through.
    pub fn set_volume(&self, level: u8) {
        if level > MAX_VOLUME {
            log::debug!(
                "[Playback] Volume {} is above the engine range (0-{})",
                level,
                MAX_VOLUME
            );
        }
        log::info!("[Playback] Volume {}", level);
        self.engine.lock().set_volume(level);
        self.state.lock().volume = level;
    }
}
