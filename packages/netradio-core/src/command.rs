//! Inbound command parsing and dispatch.
//!
//! Commands arrive as raw `(topic, payload)` pairs. The topic selects one or
//! more [`CommandKind`]s according to the configured [`TopicMatching`]
//! policy, and each kind decodes the payload with its own fail-open rule:
//! malformed input degrades to a no-op or a default, never to an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;
use crate::playback::PlaybackDriver;

/// The closed set of command kinds, keyed by topic keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    WebStream,
    PlayPause,
    Stop,
    Volume,
    SystemRestart,
}

impl CommandKind {
    /// Order in which keyword matches are evaluated and applied.
    pub const MATCH_ORDER: [CommandKind; 5] = [
        CommandKind::WebStream,
        CommandKind::PlayPause,
        CommandKind::Stop,
        CommandKind::Volume,
        CommandKind::SystemRestart,
    ];

    /// Order in which command topics are subscribed after each connect.
    pub const SUBSCRIBE_ORDER: [CommandKind; 5] = [
        CommandKind::PlayPause,
        CommandKind::Stop,
        CommandKind::SystemRestart,
        CommandKind::Volume,
        CommandKind::WebStream,
    ];

    /// Topic keyword (and exact topic suffix) for this kind.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::WebStream => "WebStream",
            Self::PlayPause => "PlayPause",
            Self::Stop => "Stop",
            Self::Volume => "Volume",
            Self::SystemRestart => "SystemRestart",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        Self::MATCH_ORDER
            .into_iter()
            .find(|kind| kind.keyword() == keyword)
    }
}

/// A decoded playback or device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to an internet stream.
    PlayStream(String),
    /// Toggle pause/resume.
    PlayPause,
    /// Stop playback.
    Stop,
    /// Set engine volume (not range-checked).
    SetVolume(u8),
    /// Restart the device.
    Restart,
}

/// Policy for mapping an inbound topic to command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicMatching {
    /// Case-sensitive keyword search anywhere after the first character of
    /// the topic. Every keyword is tested independently, so a topic that
    /// contains two keywords yields two commands, in [`CommandKind::MATCH_ORDER`].
    #[default]
    Keyword,
    /// The topic must equal `<command namespace>/<keyword>`; at most one
    /// command results.
    Exact,
}

impl TopicMatching {
    /// Returns the kinds selected by `topic`, in application order.
    #[must_use]
    pub fn kinds(self, topic: &str, command_namespace: &str) -> Vec<CommandKind> {
        match self {
            Self::Keyword => CommandKind::MATCH_ORDER
                .into_iter()
                .filter(|kind| keyword_matches(topic, kind.keyword()))
                .collect(),
            Self::Exact => topic
                .strip_prefix(command_namespace)
                .and_then(|rest| rest.strip_prefix('/'))
                .and_then(CommandKind::from_keyword)
                .into_iter()
                .collect(),
        }
    }
}

/// A keyword matches only when its first occurrence starts after index 0.
fn keyword_matches(topic: &str, keyword: &str) -> bool {
    topic.find(keyword).is_some_and(|index| index > 0)
}

/// Decodes a stream URL payload.
///
/// Byte 0 is a framing byte and is discarded. Bytes are then taken one at a
/// time; after taking byte `i` (for `i > 1`) decoding stops if byte `i + 1`
/// is a double quote. A JSON string payload such as `"http://host/a.mp3"`
/// therefore yields the bare URL, while a quote at index 2 is kept.
#[must_use]
pub fn decode_stream_url(payload: &[u8]) -> String {
    let mut url = Vec::with_capacity(payload.len().saturating_sub(1));
    for i in 1..payload.len() {
        url.push(payload[i]);
        if i > 1 && payload.get(i + 1) == Some(&b'"') {
            break;
        }
    }
    String::from_utf8_lossy(&url).into_owned()
}

/// Decodes a volume payload the way C `atoi` reads a decimal string.
///
/// Leading whitespace and one sign are accepted; parsing stops at the first
/// non-digit and a payload without digits yields 0. The result is narrowed
/// to `u8` by truncation with no range check.
#[must_use]
pub fn decode_volume(payload: &[u8]) -> u8 {
    let mut bytes = payload
        .iter()
        .copied()
        .skip_while(|b| is_c_space(*b))
        .peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let magnitude = bytes
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| {
            acc.wrapping_mul(10).wrapping_add(i64::from(digit - b'0'))
        });

    let value = if negative { magnitude.wrapping_neg() } else { magnitude };
    value as u8
}

/// C `isspace` in the "C" locale, which unlike `u8::is_ascii_whitespace`
/// includes vertical tab.
fn is_c_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t'..=b'\r')
}

/// Returns `true` when a restart payload asks for a restart.
#[must_use]
pub fn restart_requested(payload: &[u8]) -> bool {
    payload.first() == Some(&b'1')
}

/// Builds the command for one matched kind, or `None` when the payload says
/// to do nothing.
#[must_use]
pub fn decode(kind: CommandKind, payload: &[u8]) -> Option<Command> {
    match kind {
        CommandKind::WebStream => {
            let url = decode_stream_url(payload);
            (!url.is_empty()).then_some(Command::PlayStream(url))
        }
        CommandKind::PlayPause => Some(Command::PlayPause),
        CommandKind::Stop => Some(Command::Stop),
        CommandKind::Volume => Some(Command::SetVolume(decode_volume(payload))),
        CommandKind::SystemRestart => restart_requested(payload).then_some(Command::Restart),
    }
}

/// Parses and applies inbound bus messages.
///
/// Holds no state between invocations; every message is handled on its own.
pub struct CommandDispatcher {
    driver: Arc<PlaybackDriver>,
    lifecycle: Arc<dyn Lifecycle>,
    matching: TopicMatching,
    command_namespace: String,
}

impl CommandDispatcher {
    /// Creates a dispatcher.
    ///
    /// # Arguments
    /// * `driver` - Playback driver receiving playback commands
    /// * `lifecycle` - Hook receiving restart requests
    /// * `matching` - Topic matching policy
    /// * `command_namespace` - Prefix of the exact command topics
    pub fn new(
        driver: Arc<PlaybackDriver>,
        lifecycle: Arc<dyn Lifecycle>,
        matching: TopicMatching,
        command_namespace: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            lifecycle,
            matching,
            command_namespace: command_namespace.into(),
        }
    }

    /// Parses a message into the commands it carries, in application order.
    #[must_use]
    pub fn parse(&self, topic: &str, payload: &[u8]) -> Vec<Command> {
        let kinds = self.matching.kinds(topic, &self.command_namespace);
        if kinds.len() > 1 {
            log::info!(
                "[Dispatcher] Topic '{}' matches {} command keywords: {:?}",
                topic,
                kinds.len(),
                kinds
            );
        }
        kinds
            .into_iter()
            .filter_map(|kind| decode(kind, payload))
            .collect()
    }

    /// Parses a message and applies every resulting command in order.
    ///
    /// Returns the number of commands applied.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        log::info!(
            "[Dispatcher] Message on '{}' ({} bytes)",
            topic,
            payload.len()
        );
        log::debug!(
            "[Dispatcher] Payload: {}",
            String::from_utf8_lossy(payload)
        );

        let commands = self.parse(topic, payload);
        if commands.is_empty() {
            log::debug!("[Dispatcher] No command for '{}'", topic);
        }

        let count = commands.len();
        for command in commands {
            self.apply(command).await;
        }
        count
    }

    async fn apply(&self, command: Command) {
        match command {
            Command::PlayStream(url) => self.driver.connect_to_stream(&url).await,
            Command::PlayPause => self.driver.pause_resume(),
            Command::Stop => self.driver.stop(),
            Command::SetVolume(level) => self.driver.set_volume(level),
            Command::Restart => {
                log::info!("[Dispatcher] Restart command received");
                self.lifecycle.request_restart();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{EngineCall, FakeEngine, RecordingLifecycle, RecordingPublisher};

    const NAMESPACE: &str = "devices/InternetPlayer/cmd";

    fn topic(keyword: &str) -> String {
        format!("{}/{}", NAMESPACE, keyword)
    }

    struct Harness {
        dispatcher: CommandDispatcher,
        engine: FakeEngine,
        lifecycle: Arc<RecordingLifecycle>,
    }

    fn harness(matching: TopicMatching) -> Harness {
        let engine = FakeEngine::new(12);
        let driver = Arc::new(PlaybackDriver::new(
            engine.shared(),
            Arc::new(RecordingPublisher::default()),
            "devices/InternetPlayer/connectedURL",
        ));
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let dispatcher = CommandDispatcher::new(
            driver,
            Arc::clone(&lifecycle) as Arc<dyn Lifecycle>,
            matching,
            NAMESPACE,
        );
        Harness {
            dispatcher,
            engine,
            lifecycle,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Payload decoding
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn stream_url_drops_framing_byte() {
        for url in ["http://radio.example/stream.mp3", "https://a.b/c?d=e", "x"] {
            let payload = format!("#{}", url);
            assert_eq!(decode_stream_url(payload.as_bytes()), url);
        }
    }

    #[test]
    fn stream_url_unwraps_json_string() {
        assert_eq!(
            decode_stream_url(br#""http://ml01.cdn.eurozet.pl/mel-krk.mp3""#),
            "http://ml01.cdn.eurozet.pl/mel-krk.mp3"
        );
    }

    #[test]
    fn stream_url_stops_before_embedded_quote() {
        let candidate = "abcdefghijklmnop";
        for p in [2usize, 3, 5, 10] {
            let mut url = candidate.as_bytes().to_vec();
            url[p] = b'"';
            let mut payload = vec![b'>'];
            payload.extend_from_slice(&url);

            assert_eq!(
                decode_stream_url(&payload),
                &candidate[..p],
                "quote at url position {}",
                p
            );
        }
    }

    #[test]
    fn stream_url_keeps_quote_right_after_first_char() {
        assert_eq!(decode_stream_url(b">a\"bc"), "a\"bc");
    }

    #[test]
    fn stream_url_empty_for_short_payloads() {
        assert_eq!(decode_stream_url(b""), "");
        assert_eq!(decode_stream_url(b"\""), "");
    }

    #[test]
    fn volume_parses_decimal_prefix() {
        assert_eq!(decode_volume(b"15"), 15);
        assert_eq!(decode_volume(b"  7"), 7);
        assert_eq!(decode_volume(b"+3"), 3);
        assert_eq!(decode_volume(b"10abc"), 10);
    }

    #[test]
    fn volume_skips_every_c_whitespace_byte() {
        assert_eq!(decode_volume(b"\x0B15"), 15);
        assert_eq!(decode_volume(b"\x0C\r\n\t 8"), 8);
        assert_eq!(decode_volume(b"\x0015"), 0);
    }

    #[test]
    fn volume_is_not_clamped() {
        assert_eq!(decode_volume(b"99"), 99);
        assert_eq!(decode_volume(b"300"), 44);
        assert_eq!(decode_volume(b"-1"), 255);
    }

    #[test]
    fn volume_defaults_to_zero_for_non_numeric() {
        assert_eq!(decode_volume(b"loud"), 0);
        assert_eq!(decode_volume(b""), 0);
        assert_eq!(decode_volume(b"\"15\""), 0);
    }

    #[test]
    fn restart_needs_leading_one() {
        assert!(restart_requested(b"1"));
        assert!(restart_requested(b"1yes"));
        assert!(!restart_requested(b"0"));
        assert!(!restart_requested(b""));
        assert!(!restart_requested(b" 1"));
    }

    #[test]
    fn empty_stream_decode_is_ignored() {
        assert_eq!(decode(CommandKind::WebStream, b"\""), None);
        assert_eq!(
            decode(CommandKind::WebStream, b"\"u\""),
            Some(Command::PlayStream("u\"".to_string()))
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Topic matching
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn keyword_matching_finds_each_command_topic() {
        for kind in CommandKind::MATCH_ORDER {
            assert_eq!(
                TopicMatching::Keyword.kinds(&topic(kind.keyword()), NAMESPACE),
                vec![kind]
            );
        }
    }

    #[test]
    fn keyword_matching_is_case_sensitive() {
        assert!(TopicMatching::Keyword
            .kinds("devices/x/cmd/stop", NAMESPACE)
            .is_empty());
    }

    #[test]
    fn keyword_at_topic_start_does_not_match() {
        assert!(TopicMatching::Keyword.kinds("Stop", NAMESPACE).is_empty());
        assert!(TopicMatching::Keyword
            .kinds("Volume/cmd/Volume", NAMESPACE)
            .is_empty());
    }

    #[test]
    fn keyword_matching_reports_every_keyword_in_order() {
        let kinds = TopicMatching::Keyword.kinds("devices/x/cmd/VolumeStop", NAMESPACE);
        assert_eq!(kinds, vec![CommandKind::Stop, CommandKind::Volume]);
    }

    #[test]
    fn exact_matching_requires_full_topic() {
        assert_eq!(
            TopicMatching::Exact.kinds(&topic("Stop"), NAMESPACE),
            vec![CommandKind::Stop]
        );
        assert!(TopicMatching::Exact
            .kinds("devices/x/cmd/VolumeStop", NAMESPACE)
            .is_empty());
        assert!(TopicMatching::Exact
            .kinds(&format!("{}Stop", NAMESPACE), NAMESPACE)
            .is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn volume_passes_through_unclamped() {
        let h = harness(TopicMatching::Keyword);

        h.dispatcher.dispatch(&topic("Volume"), b"15").await;
        h.dispatcher.dispatch(&topic("Volume"), b"99").await;

        assert_eq!(
            h.engine.calls(),
            vec![EngineCall::SetVolume(15), EngineCall::SetVolume(99)]
        );
    }

    #[tokio::test]
    async fn stop_and_volume_in_one_topic_apply_both_in_order() {
        let h = harness(TopicMatching::Keyword);

        let applied = h
            .dispatcher
            .dispatch("devices/InternetPlayer/cmd/Volume+Stop", b"7")
            .await;

        assert_eq!(applied, 2);
        assert_eq!(
            h.engine.calls(),
            vec![EngineCall::Stop, EngineCall::SetVolume(7)]
        );
    }

    #[tokio::test]
    async fn exact_matching_ignores_combined_topic() {
        let h = harness(TopicMatching::Exact);

        let applied = h
            .dispatcher
            .dispatch("devices/InternetPlayer/cmd/Volume+Stop", b"7")
            .await;

        assert_eq!(applied, 0);
        assert!(h.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn restart_only_on_leading_one() {
        let h = harness(TopicMatching::Keyword);

        h.dispatcher.dispatch(&topic("SystemRestart"), b"0").await;
        h.dispatcher.dispatch(&topic("SystemRestart"), b"").await;
        assert_eq!(h.lifecycle.restarts(), 0);

        h.dispatcher.dispatch(&topic("SystemRestart"), b"1").await;
        assert_eq!(h.lifecycle.restarts(), 1);
    }

    #[tokio::test]
    async fn play_pause_twice_round_trips() {
        let h = harness(TopicMatching::Keyword);
        let before = h.engine.is_paused();

        h.dispatcher.dispatch(&topic("PlayPause"), b"").await;
        assert_ne!(h.engine.is_paused(), before);
        h.dispatcher.dispatch(&topic("PlayPause"), b"").await;

        assert_eq!(h.engine.is_paused(), before);
    }

    #[tokio::test]
    async fn unknown_topic_is_a_no_op() {
        let h = harness(TopicMatching::Keyword);

        let applied = h
            .dispatcher
            .dispatch("devices/InternetPlayer/cmd/Shuffle", b"1")
            .await;

        assert_eq!(applied, 0);
        assert!(h.engine.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn web_stream_connects_decoded_url() {
        let h = harness(TopicMatching::Keyword);

        h.dispatcher
            .dispatch(&topic("WebStream"), br#""http://radio/a.mp3""#)
            .await;

        assert!(h
            .engine
            .calls()
            .contains(&EngineCall::Connect("http://radio/a.mp3".to_string())));
    }
}
