//! Shared test doubles for the engine, bus and lifecycle hooks.
//!
//! These fakes record every call with the (possibly paused) Tokio clock so
//! tests can assert ordering and timing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::bus::{BusError, BusPublisher, BusResult, BusSession, InboundMessage, SessionParams};
use crate::context::LinkMonitor;
use crate::lifecycle::{Lifecycle, UpdateService};
use crate::playback::{AudioEngine, EngineActivity, SharedEngine};
use crate::protocol_constants::BUS_POLL_TIMEOUT;

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Connect(String),
    Stop,
    PauseResume,
    SetVolume(u8),
}

/// One engine call with the volume in effect right after it.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub call: EngineCall,
    pub volume: u8,
    pub at: Instant,
}

#[derive(Debug)]
struct FakeEngineState {
    timeline: Vec<TimelineEntry>,
    volume: u8,
    paused: bool,
    url: Option<String>,
    connect_ok: bool,
    ticks: u64,
}

/// Engine double; clones share state.
#[derive(Debug, Clone)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new(volume: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeEngineState {
                timeline: Vec::new(),
                volume,
                paused: false,
                url: None,
                connect_ok: true,
                ticks: 0,
            })),
        }
    }

    /// Returns a handle suitable for the driver and the audio pump.
    pub fn shared(&self) -> SharedEngine {
        Arc::new(parking_lot::Mutex::new(self.clone()))
    }

    pub fn fail_connects(&self) {
        self.state.lock().connect_ok = false;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.timeline().into_iter().map(|entry| entry.call).collect()
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.state.lock().timeline.clone()
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    pub fn ticks(&self) -> u64 {
        self.state.lock().ticks
    }

    fn record(&self, state: &mut FakeEngineState, call: EngineCall) {
        state.timeline.push(TimelineEntry {
            call,
            volume: state.volume,
            at: Instant::now(),
        });
    }
}

impl AudioEngine for FakeEngine {
    fn connect(&mut self, url: &str) -> bool {
        let mut state = self.state.lock();
        if state.connect_ok {
            state.url = Some(url.to_string());
        }
        self.record(&mut state, EngineCall::Connect(url.to_string()));
        state.connect_ok
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.url = None;
        self.record(&mut state, EngineCall::Stop);
    }

    fn pause_resume(&mut self) {
        let mut state = self.state.lock();
        state.paused = !state.paused;
        self.record(&mut state, EngineCall::PauseResume);
    }

    fn set_volume(&mut self, level: u8) {
        let mut state = self.state.lock();
        state.volume = level;
        self.record(&mut state, EngineCall::SetVolume(level));
    }

    fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    fn tick(&mut self) -> EngineActivity {
        self.state.lock().ticks += 1;
        EngineActivity::Idle
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Connect { ok: bool },
    Subscribe(String),
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    Disconnect,
}

#[derive(Debug, Default)]
struct BusScript {
    calls: Vec<(BusCall, Instant)>,
    connect_results: VecDeque<bool>,
    params: Vec<SessionParams>,
    inbound: VecDeque<InboundMessage>,
    connected: bool,
    violations: Vec<String>,
}

/// Scripted bus session; clones share state so tests can steer a session
/// that has been moved into the supervisor.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBus {
    script: Arc<Mutex<BusScript>>,
}

impl ScriptedBus {
    /// Queues connect outcomes; once exhausted every connect succeeds.
    pub fn with_connect_results(results: impl IntoIterator<Item = bool>) -> Self {
        let bus = Self::default();
        bus.script.lock().connect_results = results.into_iter().collect();
        bus
    }

    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        self.script
            .lock()
            .inbound
            .push_back(InboundMessage::new(topic, payload.to_vec()));
    }

    /// Simulates the broker dropping the session.
    pub fn drop_connection(&self) {
        self.script.lock().connected = false;
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.script
            .lock()
            .calls
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    /// Instants of every connect attempt.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|(call, _)| matches!(call, BusCall::Connect { .. }))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn params(&self) -> Vec<SessionParams> {
        self.script.lock().params.clone()
    }

    /// Subscribe/publish calls attempted while disconnected.
    pub fn violations(&self) -> Vec<String> {
        self.script.lock().violations.clone()
    }

    pub fn pending_inbound(&self) -> usize {
        self.script.lock().inbound.len()
    }
}

#[async_trait]
impl BusSession for ScriptedBus {
    async fn connect(&mut self, params: &SessionParams) -> BusResult<()> {
        let mut script = self.script.lock();
        let ok = script.connect_results.pop_front().unwrap_or(true);
        script.params.push(params.clone());
        script.calls.push((BusCall::Connect { ok }, Instant::now()));
        script.connected = ok;
        if ok {
            Ok(())
        } else {
            Err(BusError::Connect("scripted failure".to_string()))
        }
    }

    fn is_connected(&self) -> bool {
        self.script.lock().connected
    }

    fn subscribe(&mut self, topic: &str) -> BusResult<()> {
        let mut script = self.script.lock();
        if !script.connected {
            script.violations.push(format!("subscribe {}", topic));
            return Err(BusError::NotConnected);
        }
        script
            .calls
            .push((BusCall::Subscribe(topic.to_string()), Instant::now()));
        Ok(())
    }

    async fn poll(&mut self) -> BusResult<Option<InboundMessage>> {
        let next = {
            let mut script = self.script.lock();
            if !script.connected {
                return Err(BusError::Connection("scripted drop".to_string()));
            }
            script.inbound.pop_front()
        };
        // Same bounded wait as a real session with nothing to deliver.
        if next.is_none() {
            tokio::time::sleep(BUS_POLL_TIMEOUT).await;
        }
        Ok(next)
    }

    async fn disconnect(&mut self) {
        let mut script = self.script.lock();
        script.calls.push((BusCall::Disconnect, Instant::now()));
        script.connected = false;
    }

    fn publisher(&self) -> Arc<dyn BusPublisher> {
        Arc::new(self.clone())
    }
}

impl BusPublisher for ScriptedBus {
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> BusResult<()> {
        let mut script = self.script.lock();
        if !script.connected {
            script.violations.push(format!("publish {}", topic));
            return Err(BusError::NotConnected);
        }
        script.calls.push((
            BusCall::Publish {
                topic: topic.to_string(),
                payload: String::from_utf8_lossy(payload).into_owned(),
                retain,
            },
            Instant::now(),
        ));
        Ok(())
    }
}

/// Publisher that records everything and never fails.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String, bool)>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.published.lock().clone()
    }
}

impl BusPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> BusResult<()> {
        self.published.lock().push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
            retain,
        ));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle double counting requests.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    restarts: AtomicUsize,
}

impl RecordingLifecycle {
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Lifecycle for RecordingLifecycle {
    fn request_restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }

    fn request_shutdown(&self) {}
}

/// Update hook counting how often it was serviced.
#[derive(Debug, Clone, Default)]
pub struct CountingUpdates {
    count: Arc<AtomicUsize>,
}

impl CountingUpdates {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl UpdateService for CountingUpdates {
    fn service(&mut self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Link that comes up after a fixed number of negative checks.
#[derive(Debug, Default)]
pub struct FakeLink {
    down_checks: AtomicUsize,
    checks: AtomicUsize,
}

impl FakeLink {
    pub fn up_after(down_checks: usize) -> Self {
        Self {
            down_checks: AtomicUsize::new(down_checks),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl LinkMonitor for FakeLink {
    fn is_up(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.down_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}
