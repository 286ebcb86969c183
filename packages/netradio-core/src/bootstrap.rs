//! Device bootstrap and dependency wiring.
//!
//! This module is the composition root: the one place where the engine, bus
//! session, dispatcher, supervisor and execution contexts are instantiated
//! and wired together. Platform-facing parts arrive through [`DeviceParts`]
//! so tests and alternative hosts can swap them.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusSession, MqttSession, SessionParams};
use crate::command::CommandDispatcher;
use crate::context::{DeviceIdentity, LinkMonitor, LocalIpLink, Topics};
use crate::error::NetradioResult;
use crate::lifecycle::{DeviceLifecycle, Lifecycle, NoopUpdateService, UpdateService};
use crate::playback::{HeadlessEngine, PlaybackDriver, SharedEngine};
use crate::scheduler::{AudioPump, ControlRuntime};
use crate::state::Config;
use crate::supervisor::{ConnectivityState, ConnectivitySupervisor};

/// Platform-facing parts injected into the device.
pub struct DeviceParts {
    /// Audio decode/output engine.
    pub engine: SharedEngine,
    /// Broker session.
    pub session: Box<dyn BusSession>,
    /// Link-layer monitor.
    pub link: Arc<dyn LinkMonitor>,
    /// Firmware update hook.
    pub updates: Box<dyn UpdateService>,
}

impl DeviceParts {
    /// Parts for a standalone host: headless engine, MQTT session, local-IP
    /// link detection and no update channel.
    pub fn standard() -> Self {
        Self {
            engine: HeadlessEngine::shared(),
            session: Box::new(MqttSession::new()),
            link: LocalIpLink::arc(),
            updates: Box::new(NoopUpdateService),
        }
    }
}

/// A fully wired device whose execution contexts are not running yet.
pub struct BootstrappedDevice {
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Derived topic set, shared by both contexts.
    pub topics: Arc<Topics>,
    /// Playback driver (control context only).
    pub driver: Arc<PlaybackDriver>,
    /// Restart/shutdown hook.
    pub lifecycle: Arc<DeviceLifecycle>,
    /// Observes the bus session state.
    pub connectivity: watch::Receiver<ConnectivityState>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    engine: SharedEngine,
    supervisor: ConnectivitySupervisor,
    audio_core: Option<usize>,
    audio_nice: i32,
    control_core: Option<usize>,
}

/// Bootstraps the device from configuration.
///
/// Validates `config`, applies the initial volume to the engine and wires the
/// dispatcher and supervisor. Nothing touches the network until
/// [`BootstrappedDevice::start`].
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn bootstrap_device(config: &Config, parts: DeviceParts) -> NetradioResult<BootstrappedDevice> {
    config.validate()?;

    let identity = config.identity();
    let topics = Arc::new(identity.topics());
    let params = SessionParams::new(&config.broker, &identity, &topics);
    log::info!(
        "[Bootstrap] Device '{}' under {}",
        identity.name(),
        identity.namespace()
    );

    let DeviceParts {
        engine,
        session,
        link,
        updates,
    } = parts;

    let cancel_token = CancellationToken::new();
    let lifecycle = Arc::new(DeviceLifecycle::new(cancel_token.clone()));

    let driver = Arc::new(PlaybackDriver::new(
        Arc::clone(&engine),
        session.publisher(),
        topics.connected_url(),
    ));
    driver.initialize(config.initial_volume);

    let dispatcher = CommandDispatcher::new(
        Arc::clone(&driver),
        Arc::clone(&lifecycle) as Arc<dyn Lifecycle>,
        config.topic_matching,
        topics.command_namespace(),
    );

    let supervisor = ConnectivitySupervisor::new(
        session,
        params,
        Arc::clone(&topics),
        dispatcher,
        updates,
        link,
        cancel_token.clone(),
    );
    let connectivity = supervisor.subscribe();

    Ok(BootstrappedDevice {
        identity,
        topics,
        driver,
        lifecycle,
        connectivity,
        cancel_token,
        engine,
        supervisor,
        audio_core: config.audio_core,
        audio_nice: config.audio_nice,
        control_core: config.control_core,
    })
}

impl BootstrappedDevice {
    /// Starts the audio and control contexts.
    ///
    /// Must be called from outside any Tokio runtime; the control context
    /// owns its own.
    ///
    /// # Errors
    ///
    /// Returns an error if either context fails to start. A pump that was
    /// already started is stopped again.
    pub fn start(self) -> NetradioResult<RunningDevice> {
        let audio = AudioPump::spawn(
            self.engine,
            self.audio_core,
            self.audio_nice,
            self.cancel_token.clone(),
        )?;

        let supervisor = self.supervisor;
        let control = ControlRuntime::spawn(self.control_core, self.cancel_token.clone(), move || {
            supervisor.run()
        })?;

        log::info!("[Bootstrap] Execution contexts started");

        Ok(RunningDevice {
            topics: self.topics,
            driver: self.driver,
            lifecycle: self.lifecycle,
            connectivity: self.connectivity,
            cancel_token: self.cancel_token,
            audio,
            control,
        })
    }
}

/// A device with both execution contexts running.
pub struct RunningDevice {
    /// Derived topic set.
    pub topics: Arc<Topics>,
    /// Playback driver.
    pub driver: Arc<PlaybackDriver>,
    /// Restart/shutdown hook.
    pub lifecycle: Arc<DeviceLifecycle>,
    /// Observes the bus session state.
    pub connectivity: watch::Receiver<ConnectivityState>,
    /// Cancelled by shutdown requests, restart commands and signals alike.
    pub cancel_token: CancellationToken,
    audio: AudioPump,
    control: ControlRuntime,
}

impl RunningDevice {
    /// Returns `true` if a restart command was received.
    pub fn restart_requested(&self) -> bool {
        self.lifecycle.restart_requested()
    }

    /// Returns `true` once the control context has stopped.
    pub fn is_stopped(&self) -> bool {
        self.control.is_finished()
    }

    /// Stops both execution contexts and waits for them.
    ///
    /// The control context announces `offline` and closes the session before
    /// it exits.
    pub fn shutdown(&mut self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();
        self.control.shutdown();
        self.audio.shutdown();

        log::info!("[Bootstrap] Shutdown complete");
    }
}
