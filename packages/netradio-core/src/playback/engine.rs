//! Audio engine abstraction.
//!
//! The engine decodes a network stream and drives the audio sink. It is
//! shared between the audio pump (which calls [`AudioEngine::tick`] in a
//! tight loop) and the playback driver (which issues control calls), always
//! through the mutex in [`SharedEngine`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol_constants::DEFAULT_VOLUME;

/// Engine handle shared by the audio pump and the playback driver.
pub type SharedEngine = Arc<Mutex<dyn AudioEngine>>;

/// Whether a tick moved any audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineActivity {
    /// Decoded or output audio; tick again immediately.
    Busy,
    /// Nothing to do right now.
    Idle,
}

/// Primitives of the external decode/output engine.
///
/// Volume uses the engine's native 0-21 scale, but values outside it are
/// passed through untouched; any validation belongs to the implementation.
pub trait AudioEngine: Send {
    /// Connects to a stream URL and starts decoding it.
    ///
    /// Returns `false` if the engine could not open the stream.
    fn connect(&mut self, url: &str) -> bool;

    /// Stops the current stream, if any.
    fn stop(&mut self);

    /// Toggles between paused and playing.
    fn pause_resume(&mut self);

    /// Sets the output volume.
    fn set_volume(&mut self, level: u8);

    /// Returns the current output volume.
    fn volume(&self) -> u8;

    /// Performs one slice of decode/output work.
    fn tick(&mut self) -> EngineActivity;
}

/// Engine for hosts without an audio sink.
///
/// Tracks the transport state it is told about and logs every call, which is
/// enough to exercise the full command and connectivity path.
#[derive(Debug)]
pub struct HeadlessEngine {
    url: Option<String>,
    volume: u8,
    paused: bool,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            url: None,
            volume: DEFAULT_VOLUME,
            paused: false,
        }
    }

    /// Wraps the engine for sharing between execution contexts.
    pub fn shared() -> SharedEngine {
        Arc::new(Mutex::new(Self::new()))
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for HeadlessEngine {
    fn connect(&mut self, url: &str) -> bool {
        log::info!("[HeadlessEngine] Connect {}", url);
        self.url = Some(url.to_string());
        self.paused = false;
        true
    }

    fn stop(&mut self) {
        if let Some(url) = self.url.take() {
            log::info!("[HeadlessEngine] Stop {}", url);
        }
        self.paused = false;
    }

    fn pause_resume(&mut self) {
        if self.url.is_some() {
            self.paused = !self.paused;
            log::info!("[HeadlessEngine] Paused: {}", self.paused);
        }
    }

    fn set_volume(&mut self, level: u8) {
        log::debug!("[HeadlessEngine] Volume {}", level);
        self.volume = level;
    }

    fn volume(&self) -> u8 {
        self.volume
    }

    fn tick(&mut self) -> EngineActivity {
        EngineActivity::Idle
    }
}
