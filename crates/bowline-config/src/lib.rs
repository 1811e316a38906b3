//! Shared configuration for the Bowline native-messaging host.
//!
//! Configuration is layered: compiled defaults, then an optional
//! configuration file, then `BOWLINE_`-prefixed environment variables, with
//! later layers winning. The host binary is launched by the browser with a
//! fixed argument vector, so no command-line layer is exposed.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod framing;
mod logging;

pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_INVOKE_TIMEOUT_MS, DEFAULT_LOG_FILTER, DEFAULT_PIPE_NAME,
    default_channel_endpoint,
};
pub use endpoint::{ChannelEndpoint, EndpointParseError, EndpointPreparationError};
pub use framing::{FramingMode, FramingModeParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved host configuration.
#[derive(Clone, Debug, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BOWLINE")]
pub struct Config {
    /// Address of the desktop backend channel.
    #[serde(default = "defaults::default_channel_endpoint")]
    pub channel_endpoint: ChannelEndpoint,
    /// Framing strategy applied to the extension byte stream.
    #[serde(default = "defaults::default_framing_mode")]
    pub framing_mode: FramingMode,
    /// Upper bound on a single channel open attempt, in milliseconds.
    #[serde(default = "defaults::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound on a single remote invocation, in milliseconds.
    #[serde(default = "defaults::default_invoke_timeout_ms")]
    pub invoke_timeout_ms: u64,
    /// Log filter expression consumed by the telemetry layer.
    #[serde(default = "defaults::default_log_filter")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_endpoint: defaults::default_channel_endpoint(),
            framing_mode: defaults::default_framing_mode(),
            connect_timeout_ms: defaults::default_connect_timeout_ms(),
            invoke_timeout_ms: defaults::default_invoke_timeout_ms(),
            log_filter: defaults::default_log_filter(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, the config file, and environment.
    ///
    /// # Errors
    ///
    /// Returns the underlying loader error when a layer fails to parse.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load().map_err(Arc::from)
    }

    /// Log filter expression for the telemetry layer.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format for the telemetry layer.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Address of the desktop backend channel.
    #[must_use]
    pub fn channel_endpoint(&self) -> &ChannelEndpoint {
        &self.channel_endpoint
    }

    /// Framing strategy applied to the extension byte stream.
    #[must_use]
    pub fn framing_mode(&self) -> FramingMode {
        self.framing_mode
    }

    /// Upper bound on a single channel open attempt.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Upper bound on a single remote invocation.
    #[must_use]
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }
}
