//! Device configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use netradio_core::protocol_constants::{
    DEFAULT_AUDIO_NICE, DEFAULT_BROKER_PORT, DEFAULT_DEVICE_NAME, DEFAULT_TOPIC_ROOT,
    DEFAULT_VOLUME,
};
use netradio_core::{BrokerConfig, TopicMatching};
use serde::Deserialize;

/// Device configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device name; also the broker client id.
    /// Override: `NETRADIO_DEVICE_NAME`
    pub device_name: String,

    /// Topic root shared by all devices of the installation.
    pub topic_root: String,

    /// Broker hostname or IP address.
    /// Override: `NETRADIO_BROKER_HOST`
    pub broker_host: String,

    /// Broker TCP port.
    /// Override: `NETRADIO_BROKER_PORT`
    pub broker_port: u16,

    /// Broker username (anonymous when unset).
    /// Override: `NETRADIO_BROKER_USERNAME`
    pub broker_username: Option<String>,

    /// Broker password.
    /// Override: `NETRADIO_BROKER_PASSWORD`
    pub broker_password: Option<String>,

    /// Session keep-alive interval in seconds.
    pub keep_alive_secs: u64,

    /// Connect handshake timeout in seconds.
    pub connect_timeout_secs: u64,

    /// `keyword` (legacy substring matching) or `exact`.
    pub topic_matching: TopicMatching,

    /// Volume applied at startup (0-21).
    pub initial_volume: u8,

    /// CPU core for the audio context.
    pub audio_core: Option<usize>,

    /// Nice level for the audio thread; 0 disables elevation.
    /// Override: `NETRADIO_AUDIO_NICE`
    pub audio_nice: i32,

    /// CPU core for the control context.
    pub control_core: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            topic_root: DEFAULT_TOPIC_ROOT.to_string(),
            broker_host: "localhost".to_string(),
            broker_port: DEFAULT_BROKER_PORT,
            broker_username: None,
            broker_password: None,
            keep_alive_secs: 15,
            connect_timeout_secs: 10,
            topic_matching: TopicMatching::Keyword,
            initial_volume: DEFAULT_VOLUME,
            audio_core: Some(1),
            audio_nice: DEFAULT_AUDIO_NICE,
            control_core: Some(0),
        }
    }
}

impl DeviceConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    ///
    /// Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("NETRADIO_DEVICE_NAME") {
            self.device_name = val;
        }

        if let Some(val) = lookup("NETRADIO_BROKER_HOST") {
            self.broker_host = val;
        }

        if let Some(val) = lookup("NETRADIO_BROKER_PORT") {
            if let Ok(port) = val.parse() {
                self.broker_port = port;
            }
        }

        if let Some(val) = lookup("NETRADIO_BROKER_USERNAME") {
            self.broker_username = Some(val);
        }

        if let Some(val) = lookup("NETRADIO_BROKER_PASSWORD") {
            self.broker_password = Some(val);
        }

        if let Some(val) = lookup("NETRADIO_AUDIO_NICE") {
            if let Ok(nice) = val.parse() {
                self.audio_nice = nice;
            }
        }

        // Note: NETRADIO_LOG_LEVEL is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to netradio-core's Config type.
    pub fn to_core_config(&self) -> netradio_core::Config {
        netradio_core::Config {
            device_name: self.device_name.clone(),
            topic_root: self.topic_root.clone(),
            broker: BrokerConfig {
                host: self.broker_host.clone(),
                port: self.broker_port,
                username: self.broker_username.clone(),
                password: self.broker_password.clone(),
                keep_alive_secs: self.keep_alive_secs,
                connect_timeout_secs: self.connect_timeout_secs,
            },
            topic_matching: self.topic_matching,
            initial_volume: self.initial_volume,
            audio_core: self.audio_core,
            audio_nice: self.audio_nice,
            control_core: self.control_core,
        }
    }
}
