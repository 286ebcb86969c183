//! Dedicated execution contexts.
//!
//! The device runs on exactly two contexts that never share a task:
//!
//! - `audio_pump` - OS thread ticking the audio engine at elevated priority
//! - `control` - OS thread with a current-thread Tokio runtime running the
//!   connectivity supervisor
//! - `priority` - core pinning and thread priority helpers
//!
//! Both observe the same `CancellationToken`; cancelling it stops both.

mod audio_pump;
mod control;
mod priority;

pub use audio_pump::AudioPump;
pub use control::ControlRuntime;
