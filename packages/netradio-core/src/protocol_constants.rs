//! Fixed protocol constants that should NOT be changed.
//!
//! These values are part of the device's wire contract with command
//! publishers and home-automation observers, or are tuned against the
//! audio hardware. Changing them breaks deployed controllers.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Topic Layout
// ─────────────────────────────────────────────────────────────────────────────

/// Segment between the device namespace and each command keyword.
pub const COMMAND_SEGMENT: &str = "cmd";

/// Suffix of the retained availability (presence) topic.
pub const AVAILABILITY_SUFFIX: &str = "state";

/// Suffix of the retained topic carrying the currently connected stream URL.
pub const CONNECTED_URL_SUFFIX: &str = "connectedURL";

/// Default topic root under which every device namespace lives.
pub const DEFAULT_TOPIC_ROOT: &str = "devices";

/// Default device name (client id and namespace leaf).
pub const DEFAULT_DEVICE_NAME: &str = "InternetPlayer";

// ─────────────────────────────────────────────────────────────────────────────
// Presence
// ─────────────────────────────────────────────────────────────────────────────

/// Retained payload published on the availability topic after every connect.
pub const BIRTH_MESSAGE: &str = "online";

/// Last-will payload the broker publishes after an unclean disconnect.
pub const LAST_WILL_MESSAGE: &str = "offline";

// ─────────────────────────────────────────────────────────────────────────────
// Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Delay between failed session connect attempts.
///
/// Fixed: no growth and no retry limit.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Muted pause between stopping the old stream and connecting the new one.
///
/// Shorter values let the decoder tear-down click through the sink.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Poll interval while waiting for link-layer connectivity at startup.
pub const LINK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound for one non-blocking pump of the bus session.
pub const BUS_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Sleep taken by the audio pump when the engine reports nothing to do.
pub const AUDIO_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Nice level requested for the audio pump thread (-20 highest, 19 lowest).
pub const DEFAULT_AUDIO_NICE: i32 = -10;

// ─────────────────────────────────────────────────────────────────────────────
// Volume
// ─────────────────────────────────────────────────────────────────────────────

/// Lowest engine volume step (muted).
pub const MIN_VOLUME: u8 = 0;

/// Highest engine volume step.
pub const MAX_VOLUME: u8 = 21;

/// Volume applied once at startup, before any command arrives.
pub const DEFAULT_VOLUME: u8 = 12;

// ─────────────────────────────────────────────────────────────────────────────
// Bus Client
// ─────────────────────────────────────────────────────────────────────────────

/// Default MQTT broker port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Capacity of the outbound request queue of the MQTT client.
///
/// Must hold one full resubscribe burst (five topics) plus the birth message.
pub const BUS_REQUEST_CAPACITY: usize = 16;
