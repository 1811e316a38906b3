//! Session state machine for backend availability.
//!
//! The session owns the channel handle and every piece of connection state:
//! nothing else opens, uses, or discards the channel. Each connect attempt
//! carries a generation number; a failure reported against a superseded
//! generation is ignored, so a stale outcome can never overwrite status set
//! by a newer attempt.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::channel::{BackendChannel, ChannelConnector, ChannelError};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Backend availability as observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connect attempt has been made yet.
    Unknown,
    /// A connect attempt is in flight.
    Connecting,
    /// A live channel to the backend is held.
    Connected,
    /// The backend process is absent, or an established channel failed.
    Unreachable,
    /// The backend exists but refused the connection; the integration is
    /// treated as switched off.
    Disabled,
}

impl SessionStatus {
    /// Canonical status name, used as the machine-readable error code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Unreachable => "unreachable",
            Self::Disabled => "disabled",
        }
    }

    /// User-facing description for this status.
    ///
    /// The fixed table keeps internal state names out of error text shown to
    /// the extension.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Unknown => "the desktop backend has not been contacted yet",
            Self::Connecting => "still connecting to the desktop backend",
            Self::Connected => "connected to the desktop backend",
            Self::Unreachable => "the desktop backend is not running",
            Self::Disabled => "the desktop integration is disabled",
        }
    }
}

/// Connection state machine owning the backend channel handle.
pub struct Session {
    connector: Box<dyn ChannelConnector>,
    connect_timeout: Duration,
    invoke_timeout: Duration,
    status: SessionStatus,
    channel: Option<Box<dyn BackendChannel>>,
    generation: u64,
}

impl Session {
    /// Creates a session in the `Unknown` state.
    #[must_use]
    pub fn new(
        connector: Box<dyn ChannelConnector>,
        connect_timeout: Duration,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            connect_timeout,
            invoke_timeout,
            status: SessionStatus::Unknown,
            channel: None,
            generation: 0,
        }
    }

    /// Current backend availability.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Performs one timeout-bounded connect attempt.
    ///
    /// An absent backend or an expired timer leaves the session
    /// `Unreachable`; any other failure marks the integration `Disabled`.
    pub fn connect(&mut self) -> SessionStatus {
        self.generation += 1;
        let attempt = self.generation;
        self.status = SessionStatus::Connecting;
        self.channel = None;

        match self.connector.connect(self.connect_timeout) {
            Ok(channel) => {
                if attempt == self.generation {
                    self.channel = Some(channel);
                    self.status = SessionStatus::Connected;
                    debug!(target: SESSION_TARGET, "backend connected");
                }
            }
            Err(error) => {
                let status = match error {
                    ChannelError::Absent { .. } | ChannelError::Timeout { .. } => {
                        SessionStatus::Unreachable
                    }
                    _ => SessionStatus::Disabled,
                };
                warn!(
                    target: SESSION_TARGET,
                    %error,
                    status = status.as_str(),
                    "backend connect failed"
                );
                self.resolve_attempt(attempt, status);
            }
        }
        self.status
    }

    /// Connects only when no live channel is held.
    pub fn ensure_connected(&mut self) -> SessionStatus {
        if self.status == SessionStatus::Connected {
            return self.status;
        }
        self.connect()
    }

    /// Invokes a command over the live channel.
    ///
    /// A timeout or structural channel failure discards the handle and
    /// demotes the session to `Unreachable`; remote command errors leave the
    /// channel intact.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] without a live channel, or the
    /// channel's own failure.
    pub fn invoke(
        &mut self,
        command: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Value, ChannelError> {
        if self.status != SessionStatus::Connected {
            return Err(ChannelError::NotConnected);
        }
        let attempt = self.generation;
        let Some(channel) = self.channel.as_mut() else {
            return Err(ChannelError::NotConnected);
        };

        let outcome = channel.call(command, params, self.invoke_timeout);
        if let Err(error) = &outcome
            && error.is_terminal()
        {
            warn!(
                target: SESSION_TARGET,
                %error,
                command,
                "channel failed during invoke"
            );
            self.fail_channel(attempt);
        }
        outcome
    }

    /// Whether the live channel exposes a callable for the command.
    #[must_use]
    pub fn supports(&self, command: &str) -> bool {
        self.channel
            .as_ref()
            .is_some_and(|channel| channel.supports(command))
    }

    /// Records the outcome of a connect attempt, ignoring stale reports.
    fn resolve_attempt(&mut self, attempt: u64, status: SessionStatus) {
        if attempt == self.generation {
            self.status = status;
        }
    }

    /// Discards a failed channel, unless a newer attempt already replaced it.
    fn fail_channel(&mut self, attempt: u64) {
        if attempt == self.generation {
            self.channel = None;
            self.status = SessionStatus::Unreachable;
        }
    }
}
