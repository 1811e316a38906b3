use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::endpoint::ChannelEndpoint;

/// Default named pipe used when Unix domain sockets are not available.
pub const DEFAULT_PIPE_NAME: &str = "bowline-backend";

/// Default log filter expression used by the host binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default connect timeout applied to channel open attempts, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default invoke timeout applied to remote calls, in milliseconds.
pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 30_000;

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the host binary.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default framing strategy for the extension byte stream.
pub fn default_framing_mode() -> crate::framing::FramingMode {
    crate::framing::FramingMode::Strict
}

/// Default connect timeout in milliseconds.
pub fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default invoke timeout in milliseconds.
pub fn default_invoke_timeout_ms() -> u64 {
    DEFAULT_INVOKE_TIMEOUT_MS
}

/// Computes the default backend channel endpoint.
///
/// Unix socket paths must stay short: the kernel caps `sun_path` around a
/// hundred bytes, so the path is rooted in the user runtime directory rather
/// than a deep application data directory.
pub fn default_channel_endpoint() -> ChannelEndpoint {
    default_channel_endpoint_inner()
}

#[cfg(unix)]
fn default_channel_endpoint_inner() -> ChannelEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("bowline");
    if apply_namespace {
        base.push(user_namespace());
    }

    let socket_path = base.join("backend.sock");
    ChannelEndpoint::unix(socket_path)
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_channel_endpoint_inner() -> ChannelEndpoint {
    ChannelEndpoint::pipe(DEFAULT_PIPE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn default_endpoint_is_a_unix_socket() {
        let endpoint = default_channel_endpoint();
        let path = endpoint.unix_path().expect("unix endpoint");
        assert!(path.as_str().ends_with("backend.sock"));
        assert!(path.as_str().contains("bowline"));
    }

    #[test]
    fn timeouts_have_sane_defaults() {
        assert!(DEFAULT_CONNECT_TIMEOUT_MS < DEFAULT_INVOKE_TIMEOUT_MS);
    }
}
