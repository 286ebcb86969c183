//! Centralized error types for the netradio core library.
//!
//! Only startup and wiring failures surface as errors. Runtime faults on the
//! command path degrade silently and connectivity faults are retried forever,
//! so nothing here reaches the command dispatcher's caller.

use thiserror::Error;

use crate::bus::BusError;
use crate::context::NetworkError;

/// Trait for error types that provide machine-readable error codes.
///
/// Codes are stable labels used in log lines so that operators can grep for
/// a failure class without matching on free-form messages.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for BusError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "bus_connect_failed",
            Self::Timeout(_) => "bus_connect_timeout",
            Self::NotConnected => "bus_not_connected",
            Self::Request(_) => "bus_request_failed",
            Self::Connection(_) => "bus_connection_lost",
        }
    }
}

impl ErrorCode for NetworkError {
    fn code(&self) -> &'static str {
        match self {
            Self::Detection(_) => "link_detection_failed",
        }
    }
}

/// Application-wide error type for the netradio core.
#[derive(Debug, Error)]
pub enum NetradioError {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Message bus session failure.
    #[error("Bus error: {0}")]
    Bus(String),

    /// An execution context could not be started.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl NetradioError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Bus(_) => "bus_error",
            Self::Scheduler(_) => "scheduler_error",
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type NetradioResult<T> = Result<T, NetradioError>;

impl From<BusError> for NetradioError {
    fn from(err: BusError) -> Self {
        Self::Bus(err.to_string())
    }
}

impl From<std::io::Error> for NetradioError {
    fn from(err: std::io::Error) -> Self {
        Self::Scheduler(err.to_string())
    }
}
