//! Unix domain socket channel to the desktop backend.
//!
//! The backend speaks newline-delimited JSON over a filesystem-backed
//! socket: one request line out, one reply line back. Connect attempts are
//! bounded with a `socket2` connect timeout and replies with a socket read
//! timeout, so neither operation can stall the host indefinitely.

use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use bowline_config::ChannelEndpoint;

use super::{
    BackendChannel, CHANNEL_TARGET, ChannelConnector, ChannelError, classify_connect_error,
};

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
#[cfg(unix)]
use std::os::unix::io::OwnedFd;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Connector resolving a configured endpoint to live channels.
#[derive(Debug)]
pub struct SocketConnector {
    endpoint: ChannelEndpoint,
}

impl SocketConnector {
    /// Creates a connector for the given endpoint.
    #[must_use]
    pub fn new(endpoint: ChannelEndpoint) -> Self {
        Self { endpoint }
    }
}

impl ChannelConnector for SocketConnector {
    fn connect(&self, timeout: Duration) -> Result<Box<dyn BackendChannel>, ChannelError> {
        match &self.endpoint {
            ChannelEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    let stream = connect_unix(path.as_str(), timeout)
                        .map_err(|error| classify_connect_error(error, timeout))?;
                    debug!(
                        target: CHANNEL_TARGET,
                        endpoint = %self.endpoint,
                        "channel open"
                    );
                    Ok(Box::new(UnixBackendChannel::new(stream)?))
                }

                #[cfg(not(unix))]
                {
                    Err(ChannelError::Unsupported {
                        endpoint: self.endpoint.to_string(),
                    })
                }
            }
            ChannelEndpoint::Pipe { .. } => Err(ChannelError::Unsupported {
                endpoint: self.endpoint.to_string(),
            }),
        }
    }
}

#[cfg(unix)]
fn connect_unix(path: &str, timeout: Duration) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)?;
    Ok(OwnedFd::from(socket).into())
}

/// Request line sent to the backend.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Map<String, Value>>,
}

/// Reply line received from the backend.
#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// JSONL channel over a connected Unix stream.
#[cfg(unix)]
#[derive(Debug)]
struct UnixBackendChannel {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

#[cfg(unix)]
impl UnixBackendChannel {
    fn new(stream: UnixStream) -> Result<Self, ChannelError> {
        let reader = stream
            .try_clone()
            .map(BufReader::new)
            .map_err(|source| ChannelError::Refused { source })?;
        Ok(Self {
            reader,
            writer: stream,
        })
    }

    fn send_request(&mut self, line: &[u8]) -> Result<(), ChannelError> {
        self.writer.write_all(line).map_err(destroyed)?;
        self.writer.write_all(b"\n").map_err(destroyed)?;
        self.writer.flush().map_err(destroyed)?;
        Ok(())
    }

    fn read_reply(&mut self, timeout: Duration) -> Result<WireReply, ChannelError> {
        self.reader
            .get_ref()
            .set_read_timeout(Some(timeout))
            .map_err(destroyed)?;

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Err(ChannelError::Destroyed {
                reason: "backend closed the channel".to_string(),
            }),
            Ok(_) => Ok(serde_json::from_str(&line)?),
            Err(error)
                if error.kind() == io::ErrorKind::TimedOut
                    || error.kind() == io::ErrorKind::WouldBlock =>
            {
                Err(ChannelError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(error) => Err(destroyed(error)),
        }
    }
}

#[cfg(unix)]
impl BackendChannel for UnixBackendChannel {
    /// The backend validates command names itself; every catalogued command
    /// is callable over a live channel.
    fn supports(&self, _command: &str) -> bool {
        true
    }

    fn call<'a>(
        &mut self,
        command: &str,
        params: Option<&'a Map<String, Value>>,
        timeout: Duration,
    ) -> Result<Value, ChannelError> {
        let line = serde_json::to_vec(&WireRequest { command, params })?;
        self.send_request(&line)?;

        let reply = self.read_reply(timeout)?;
        match reply.error {
            Some(message) => Err(ChannelError::Remote { message }),
            None => Ok(reply.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(unix)]
fn destroyed(error: io::Error) -> ChannelError {
    ChannelError::Destroyed {
        reason: error.to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixListener;
    use std::thread::{self, JoinHandle};

    use serde_json::json;

    use super::*;

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    /// Fake backend accepting one connection and answering each request
    /// line with a canned reply.
    fn spawn_backend(
        listener: UnixListener,
        reply_for: impl Fn(&str) -> Option<String> + Send + 'static,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut writer = stream;
            let mut line = String::new();
            while reader.read_line(&mut line).expect("read") > 0 {
                let Some(reply) = reply_for(line.trim_end()) else {
                    break;
                };
                writer.write_all(reply.as_bytes()).expect("write");
                writer.write_all(b"\n").expect("newline");
                line.clear();
            }
        })
    }

    fn connector_for(path: &std::path::Path) -> SocketConnector {
        let utf8 = path.to_str().expect("utf8 path").to_string();
        SocketConnector::new(ChannelEndpoint::unix(utf8))
    }

    #[test]
    fn call_round_trips_result() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        let server = spawn_backend(listener, |request| {
            assert!(request.contains(r#""command":"vault-status""#));
            Some(r#"{"result":{"locked":true}}"#.to_string())
        });

        let mut channel = connector_for(&path).connect(TEST_TIMEOUT).expect("connect");
        let result = channel
            .call("vault-status", None, TEST_TIMEOUT)
            .expect("call");
        assert_eq!(result, json!({"locked": true}));

        drop(channel);
        server.join().expect("join backend");
    }

    #[test]
    fn call_forwards_params_and_surfaces_remote_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        let server = spawn_backend(listener, |request| {
            assert!(request.contains(r#""passphrase":"wrong""#));
            Some(r#"{"error":"invalid passphrase"}"#.to_string())
        });

        let mut params = Map::new();
        params.insert("passphrase".to_string(), json!("wrong"));

        let mut channel = connector_for(&path).connect(TEST_TIMEOUT).expect("connect");
        let error = channel
            .call("unlock", Some(&params), TEST_TIMEOUT)
            .expect_err("backend rejects");
        assert!(matches!(
            error,
            ChannelError::Remote { ref message } if message == "invalid passphrase"
        ));

        drop(channel);
        server.join().expect("join backend");
    }

    #[test]
    fn backend_death_mid_call_is_destroyed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        // Reply with None: the fake backend hangs up without answering.
        let server = spawn_backend(listener, |_| None);

        let mut channel = connector_for(&path).connect(TEST_TIMEOUT).expect("connect");
        let error = channel
            .call("lock", None, TEST_TIMEOUT)
            .expect_err("channel must break");
        assert!(matches!(error, ChannelError::Destroyed { .. }));

        server.join().expect("join backend");
    }

    #[test]
    fn missing_socket_reports_absent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("never-bound.sock");
        let error = connector_for(&path)
            .connect(TEST_TIMEOUT)
            .expect_err("no backend to reach");
        assert!(matches!(error, ChannelError::Absent { .. }));
    }

    #[test]
    fn pipe_endpoint_is_unsupported_here() {
        let connector = SocketConnector::new(ChannelEndpoint::pipe("bowline-backend"));
        let error = connector
            .connect(TEST_TIMEOUT)
            .expect_err("pipes are not reachable from the unix channel");
        assert!(matches!(error, ChannelError::Unsupported { .. }));
    }

    #[test]
    fn slow_backend_times_out() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        // Accept but never reply; keep the stream alive until the client
        // gives up.
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            thread::sleep(Duration::from_millis(400));
            drop(stream);
        });

        let mut channel = connector_for(&path).connect(TEST_TIMEOUT).expect("connect");
        let error = channel
            .call("lock", None, Duration::from_millis(100))
            .expect_err("reply never arrives");
        assert!(matches!(error, ChannelError::Timeout { timeout_ms: 100 }));

        server.join().expect("join backend");
    }
}
