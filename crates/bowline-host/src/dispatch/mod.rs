//! Request dispatch between the extension and the backend channel.
//!
//! The dispatcher validates each decoded request, keeps the session
//! connected opportunistically, and maps every outcome into a response the
//! extension can correlate by id. No failure here is allowed to escape as a
//! process error: bad requests, missing backends, and broken channels all
//! become failure responses.

pub mod catalog;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use bowline_proto::{Request, Response};

use crate::channel::ChannelError;
use crate::session::{Session, SessionStatus};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Name of the availability probe command.
///
/// Availability never fails structurally; it always reports the current
/// backend status after a fresh connect attempt.
const AVAILABILITY_COMMAND: &str = "availability";

/// Transport-only padding field injected by the extension to work around
/// its length-header bug. Stripped before forwarding; never business data.
const PADDING_FIELD: &str = "padding";

/// Routes decoded extension messages to the backend through the session.
pub struct Dispatcher {
    session: Session,
}

impl Dispatcher {
    /// Creates a dispatcher driving the given session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Handles one decoded message, returning the response to frame back.
    pub fn dispatch(&mut self, payload: Value) -> Response {
        let request = match Request::from_value(payload) {
            Ok(request) => request,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "malformed request");
                return Response::failure(String::new(), format!("malformed request: {error}"));
            }
        };

        debug!(
            target: DISPATCH_TARGET,
            id = %request.id,
            command = %request.command,
            "dispatching request"
        );

        let params = strip_padding(request.params);

        if request.command == AVAILABILITY_COMMAND {
            return self.dispatch_availability(&request.id);
        }

        if self.session.status() != SessionStatus::Connected {
            let status = self.session.ensure_connected();
            if status != SessionStatus::Connected {
                return Response::failure_with_code(
                    &request.id,
                    status.message(),
                    status.as_str(),
                );
            }
        }

        if !catalog::contains(&request.command) || !self.session.supports(&request.command) {
            warn!(
                target: DISPATCH_TARGET,
                command = %request.command,
                "refusing unknown command"
            );
            return Response::failure(&request.id, "unknown method");
        }

        match self.session.invoke(&request.command, params.as_ref()) {
            Ok(result) => Response::success(&request.id, Some(result)),
            Err(error @ ChannelError::Destroyed { .. }) => {
                self.retry_once(&request.id, &request.command, params.as_ref(), &error)
            }
            Err(error) => Response::failure(&request.id, error.to_string()),
        }
    }

    /// Availability probe: reconnect, then report status as a success.
    fn dispatch_availability(&mut self, id: &str) -> Response {
        let status = self.session.ensure_connected();
        Response::success(
            id,
            Some(json!({
                "available": status == SessionStatus::Connected,
                "status": status.as_str(),
                "message": status.message(),
                "catalogVersion": catalog::CATALOG_VERSION,
            })),
        )
    }

    /// Single reconnect-and-retry after the channel died mid-call.
    ///
    /// Exactly one retry: a second structural failure gives up and surfaces
    /// the error text.
    fn retry_once(
        &mut self,
        id: &str,
        command: &str,
        params: Option<&Map<String, Value>>,
        original: &ChannelError,
    ) -> Response {
        debug!(
            target: DISPATCH_TARGET,
            command,
            "channel destroyed mid-call; retrying once"
        );
        if self.session.ensure_connected() != SessionStatus::Connected {
            return Response::failure(id, original.to_string());
        }
        match self.session.invoke(command, params) {
            Ok(result) => Response::success(id, Some(result)),
            Err(retry_error) => Response::failure(id, retry_error.to_string()),
        }
    }
}

/// Removes the transport padding field from request parameters.
fn strip_padding(params: Option<Map<String, Value>>) -> Option<Map<String, Value>> {
    params.map(|mut map| {
        map.remove(PADDING_FIELD);
        map
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use mockall::predicate;
    use serde_json::json;

    use crate::channel::{BackendChannel, MockBackendChannel, MockChannelConnector};
    use crate::session::Session;

    use super::*;

    fn dispatcher_with(connector: MockChannelConnector) -> Dispatcher {
        Dispatcher::new(Session::new(
            Box::new(connector),
            Duration::from_millis(500),
            Duration::from_millis(1_000),
        ))
    }

    fn connector_returning(
        build: impl Fn() -> MockBackendChannel + Send + 'static,
    ) -> MockChannelConnector {
        let mut connector = MockChannelConnector::new();
        connector
            .expect_connect()
            .returning(move |_| Ok(Box::new(build()) as Box<dyn BackendChannel>));
        connector
    }

    fn unreachable_connector() -> MockChannelConnector {
        let mut connector = MockChannelConnector::new();
        connector.expect_connect().returning(|_| {
            Err(ChannelError::Absent {
                source: io::Error::new(io::ErrorKind::NotFound, "no such socket"),
            })
        });
        connector
    }

    fn request(id: &str, command: &str) -> Value {
        json!({"id": id, "command": command})
    }

    #[test]
    fn availability_succeeds_when_backend_is_absent() {
        let mut dispatcher = dispatcher_with(unreachable_connector());
        let response = dispatcher.dispatch(request("req-1", "availability"));

        assert_eq!(response.id, "req-1");
        assert!(response.success);
        let result = response.result.expect("availability payload");
        assert_eq!(result["available"], json!(false));
        assert_eq!(result["status"], json!("unreachable"));
    }

    #[test]
    fn availability_reports_connected_backend() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-1", "availability"));

        assert!(response.success);
        let result = response.result.expect("availability payload");
        assert_eq!(result["available"], json!(true));
        assert_eq!(result["status"], json!("connected"));
    }

    #[test]
    fn unreachable_backend_yields_coded_failure() {
        let mut dispatcher = dispatcher_with(unreachable_connector());
        let response = dispatcher.dispatch(request("req-2", "lock"));

        assert_eq!(response.id, "req-2");
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("unreachable"));
        assert_eq!(
            response.error.as_deref(),
            Some("the desktop backend is not running")
        );
    }

    #[test]
    fn disabled_backend_yields_coded_failure() {
        let mut connector = MockChannelConnector::new();
        connector.expect_connect().returning(|_| {
            Err(ChannelError::Refused {
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            })
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-3", "lock"));

        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("disabled"));
    }

    #[test]
    fn unknown_command_never_reaches_the_channel() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            // No expect_call: reaching the channel would panic the mock.
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-4", "self-destruct"));

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("unknown method"));
    }

    #[test]
    fn catalogued_command_without_callable_is_unknown() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(false);
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-5", "lock"));

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("unknown method"));
    }

    #[test]
    fn successful_invoke_echoes_id_and_result() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            channel
                .expect_call()
                .with(
                    predicate::eq("vault-status"),
                    predicate::always(),
                    predicate::always(),
                )
                .returning(|_, _, _| Ok(json!({"locked": true})));
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-6", "vault-status"));

        assert_eq!(response.id, "req-6");
        assert!(response.success);
        assert_eq!(response.result, Some(json!({"locked": true})));
    }

    #[test]
    fn padding_field_is_stripped_before_forwarding() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            channel.expect_call().returning(|_, params, _| {
                let params = params.expect("params forwarded");
                assert!(!params.contains_key("padding"));
                assert_eq!(params.get("passphrase"), Some(&json!("hunter2")));
                Ok(Value::Null)
            });
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(json!({
            "id": "req-7",
            "command": "unlock",
            "params": {"passphrase": "hunter2", "padding": "xxxxxxxx"},
        }));
        assert!(response.success);
    }

    #[test]
    fn remote_error_surfaces_as_failure_text() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            channel.expect_call().returning(|_, _, _| {
                Err(ChannelError::Remote {
                    message: "invalid passphrase".to_string(),
                })
            });
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-8", "unlock"));

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("invalid passphrase"));
        assert!(response.error_code.is_none());
    }

    #[test]
    fn destroyed_channel_is_retried_exactly_once() {
        let mut calls = 0_u32;
        let mut connector = MockChannelConnector::new();
        connector.expect_connect().times(2).returning(move |_| {
            calls += 1;
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            if calls == 1 {
                channel.expect_call().times(1).returning(|_, _, _| {
                    Err(ChannelError::Destroyed {
                        reason: "backend died".to_string(),
                    })
                });
            } else {
                channel
                    .expect_call()
                    .times(1)
                    .returning(|_, _, _| Ok(json!("recovered")));
            }
            Ok(Box::new(channel) as Box<dyn BackendChannel>)
        });

        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-9", "lock"));

        assert!(response.success);
        assert_eq!(response.result, Some(json!("recovered")));
    }

    #[test]
    fn second_destroyed_failure_gives_up() {
        let connector = connector_returning(|| {
            let mut channel = MockBackendChannel::new();
            channel.expect_supports().return_const(true);
            channel.expect_call().times(1).returning(|_, _, _| {
                Err(ChannelError::Destroyed {
                    reason: "backend died".to_string(),
                })
            });
            channel
        });
        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-10", "lock"));

        assert!(!response.success);
        assert!(
            response
                .error
                .as_deref()
                .is_some_and(|text| text.contains("backend died"))
        );
    }

    #[test]
    fn retry_gives_up_when_reconnect_fails() {
        let mut calls = 0_u32;
        let mut connector = MockChannelConnector::new();
        connector.expect_connect().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                let mut channel = MockBackendChannel::new();
                channel.expect_supports().return_const(true);
                channel.expect_call().returning(|_, _, _| {
                    Err(ChannelError::Destroyed {
                        reason: "backend died".to_string(),
                    })
                });
                Ok(Box::new(channel) as Box<dyn BackendChannel>)
            } else {
                Err(ChannelError::Absent {
                    source: io::Error::new(io::ErrorKind::NotFound, "gone"),
                })
            }
        });

        let mut dispatcher = dispatcher_with(connector);
        let response = dispatcher.dispatch(request("req-11", "lock"));

        assert!(!response.success);
        assert!(
            response
                .error
                .as_deref()
                .is_some_and(|text| text.contains("backend died"))
        );
    }

    #[test]
    fn malformed_request_fails_without_panicking() {
        let mut dispatcher = dispatcher_with(MockChannelConnector::new());
        let response = dispatcher.dispatch(json!({"id": "req-12"}));

        assert!(!response.success);
        assert!(
            response
                .error
                .as_deref()
                .is_some_and(|text| text.starts_with("malformed request"))
        );
    }
}
