//! Domain error types

use thiserror::Error;

use super::ControlLine;

/// Failures raised by the serial transport itself (open/close/line writes).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("port not found")]
    NotFound,

    #[error("port is busy (held by another process)")]
    Busy,

    #[error("permission denied")]
    PermissionDenied,

    #[error("port already closed")]
    AlreadyClosed,

    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors that can occur while sharing a port or driving PTT/CW lines
#[derive(Error, Debug)]
pub enum PttError {
    #[error("Port {port} unavailable: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: TransportError,
    },

    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    #[error("Port {0} was already released")]
    AlreadyReleased(String),

    #[error("Port {0} is not tracked by this registry")]
    UnknownHandle(String),

    #[error("Invalid shared handle: {0}")]
    InvalidSharedHandle(String),

    #[error("Failed to set {line} on {port}: {source}")]
    LineControlFailed {
        port: String,
        line: ControlLine,
        #[source]
        source: TransportError,
    },

    #[error("Not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keyer error: {0}")]
    Keyer(String),
}

/// Result type alias for PTT operations
pub type PttResult<T> = Result<T, PttError>;
