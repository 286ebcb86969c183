//! Audio engine abstraction and the playback driver built on it.
//!
//! - `engine` - [`AudioEngine`] trait, [`SharedEngine`] handle, headless engine
//! - `driver` - [`PlaybackDriver`] with the click-free stream connect sequence

mod driver;
mod engine;

pub use driver::PlaybackDriver;
pub use engine::{AudioEngine, EngineActivity, HeadlessEngine, SharedEngine};
