//! Backend channel abstractions.
//!
//! The desktop backend is an external collaborator: the host only needs to
//! open a channel to it, ask whether a named command is callable, and invoke
//! commands with a bounded wait. The trait seam here keeps the session and
//! dispatcher testable without a live backend.

mod unix;

use std::io;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

pub use unix::SocketConnector;

pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Failures raised by channel connect and invoke operations.
///
/// Connect failures are split into "backend absent" (the socket does not
/// exist) and everything else; the session maps the former to an
/// unreachable backend and the latter to a disabled integration.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The backend endpoint does not exist; the backend process is absent.
    #[error("backend endpoint not found: {source}")]
    Absent {
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
    /// The endpoint exists but the connection was refused or misbehaved.
    #[error("failed to connect to backend: {source}")]
    Refused {
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
    /// The platform cannot reach this endpoint kind.
    #[error("endpoint '{endpoint}' is not supported on this platform")]
    Unsupported {
        /// Display form of the endpoint.
        endpoint: String,
    },
    /// A connect or invoke exceeded its time bound.
    #[error("backend operation timed out after {timeout_ms} ms")]
    Timeout {
        /// The bound that was exceeded, in milliseconds.
        timeout_ms: u64,
    },
    /// The channel broke mid-call; the backend process died.
    #[error("channel to backend destroyed: {reason}")]
    Destroyed {
        /// Description of the structural failure.
        reason: String,
    },
    /// The backend executed the command and reported a failure.
    #[error("{message}")]
    Remote {
        /// Error text from the backend.
        message: String,
    },
    /// Channel traffic could not be encoded or decoded.
    #[error("failed to encode or decode channel traffic: {0}")]
    Codec(#[from] serde_json::Error),
    /// The channel is not open.
    #[error("channel is not connected")]
    NotConnected,
}

impl ChannelError {
    /// Whether the failure structurally broke the channel handle.
    ///
    /// Terminal failures require the session to discard the handle; remote
    /// command errors and codec noise leave the channel usable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Destroyed { .. } | Self::NotConnected
        )
    }
}

/// Live connection to the desktop backend.
#[cfg_attr(test, mockall::automock)]
pub trait BackendChannel: std::fmt::Debug {
    /// Whether the backend exposes a callable for the named command.
    fn supports(&self, command: &str) -> bool;

    /// Invokes a named command, waiting at most `timeout` for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Timeout`] when the bound elapses,
    /// [`ChannelError::Destroyed`] when the backend dies mid-call, and
    /// [`ChannelError::Remote`] when the backend reports a command failure.
    fn call<'a>(
        &mut self,
        command: &str,
        params: Option<&'a Map<String, Value>>,
        timeout: Duration,
    ) -> Result<Value, ChannelError>;
}

/// Opens channels to the backend.
///
/// The session owns one connector and asks it for a fresh channel on every
/// connect attempt.
#[cfg_attr(test, mockall::automock)]
pub trait ChannelConnector {
    /// Opens a channel, waiting at most `timeout` for the backend to accept.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Absent`] when the endpoint does not exist,
    /// [`ChannelError::Timeout`] when the bound elapses, and
    /// [`ChannelError::Refused`] for any other connect failure.
    fn connect(&self, timeout: Duration) -> Result<Box<dyn BackendChannel>, ChannelError>;
}

/// Classifies a connect failure by its I/O error signature.
///
/// `NotFound` and `AddrNotAvailable` carry the "no such file or socket"
/// signature of an absent backend process; a timeout keeps its own
/// identity; everything else is a refusal.
pub(crate) fn classify_connect_error(error: io::Error, timeout: Duration) -> ChannelError {
    match error.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable => {
            ChannelError::Absent { source: error }
        }
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ChannelError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        _ => ChannelError::Refused { source: error },
    }
}
