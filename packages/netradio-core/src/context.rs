//! Device context: identity, derived topic names, and link-layer detection.
//!
//! [`DeviceIdentity`] is created once at startup and every topic the device
//! touches is derived from it into an immutable [`Topics`] set. The set is
//! shared behind an `Arc` by both execution contexts and never recomputed.

use std::sync::Arc;

use crate::command::CommandKind;
use crate::error::ErrorCode;
use crate::protocol_constants::{AVAILABILITY_SUFFIX, COMMAND_SEGMENT, CONNECTED_URL_SUFFIX};

/// Immutable identity of this device on the message bus.
///
/// The name doubles as the bus client id; the root groups devices of the
/// same installation (e.g. `devices`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    root: String,
    name: String,
}

impl DeviceIdentity {
    /// Creates an identity from a topic root and a device name.
    pub fn new(root: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// Returns the device name (also used as the bus client id).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the per-device namespace, e.g. `devices/InternetPlayer`.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.root, self.name)
    }

    /// Derives the full topic set for this identity.
    #[must_use]
    pub fn topics(&self) -> Topics {
        let namespace = self.namespace();
        let command_namespace = format!("{}/{}", namespace, COMMAND_SEGMENT);
        let commands = CommandKind::SUBSCRIBE_ORDER
            .iter()
            .map(|kind| (*kind, format!("{}/{}", command_namespace, kind.keyword())))
            .collect();

        Topics {
            availability: format!("{}/{}", namespace, AVAILABILITY_SUFFIX),
            connected_url: format!("{}/{}", namespace, CONNECTED_URL_SUFFIX),
            command_namespace,
            commands,
        }
    }
}

/// Every topic name used by the device, derived once from [`DeviceIdentity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    availability: String,
    connected_url: String,
    command_namespace: String,
    commands: Vec<(CommandKind, String)>,
}

impl Topics {
    /// Retained presence topic (`online` / last-will `offline`).
    #[must_use]
    pub fn availability(&self) -> &str {
        &self.availability
    }

    /// Retained topic carrying the last successfully connected stream URL.
    #[must_use]
    pub fn connected_url(&self) -> &str {
        &self.connected_url
    }

    /// Prefix shared by all command topics, e.g. `devices/InternetPlayer/cmd`.
    #[must_use]
    pub fn command_namespace(&self) -> &str {
        &self.command_namespace
    }

    /// Command topics in subscription order.
    pub fn command_topics(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|(_, topic)| topic.as_str())
    }
}

/// Trait for querying link-layer connectivity (Wi-Fi association, DHCP lease).
///
/// The supervisor only consults this once, at startup, before the first
/// session connect.
pub trait LinkMonitor: Send + Sync {
    /// Returns `true` once the device has a usable network link.
    fn is_up(&self) -> bool;
}

/// Link monitor that treats "a routable local IP exists" as link-up.
#[derive(Debug, Clone, Default)]
pub struct LocalIpLink;

impl LocalIpLink {
    /// Creates a new `LocalIpLink`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Creates a new `LocalIpLink` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn LinkMonitor> {
        Arc::new(Self::new())
    }

    /// Detects the local IP address used for outbound traffic.
    pub fn detect(&self) -> Result<String, NetworkError> {
        local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

impl LinkMonitor for LocalIpLink {
    fn is_up(&self) -> bool {
        match self.detect() {
            Ok(ip) => {
                log::debug!("[Link] Local address {}", ip);
                true
            }
            Err(e) => {
                log::trace!("[Link] Not up [{}]: {}", e.code(), e);
                false
            }
        }
    }
}

/// Errors that can occur during link detection.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not detect a local IP address.
    #[error("Failed to detect local IP: {0}")]
    Detection(String),
}
