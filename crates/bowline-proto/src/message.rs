//! Request and response types exchanged with the browser extension.
//!
//! The request schema mirrors the format produced by the extension's
//! background worker. Responses always echo the caller-supplied `id` so the
//! extension can correlate them; exactly one of the success and failure
//! shapes holds for any response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed command request from the extension.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Request {
    /// Correlation id, echoed verbatim on the response. The extension owns
    /// id allocation; a missing id deserializes as an empty string.
    #[serde(default)]
    pub id: String,
    /// Name of the backend command to invoke. Older extension builds send
    /// this under `method`.
    #[serde(alias = "method")]
    pub command: String,
    /// Optional parameters forwarded to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl Request {
    /// Parses a request from a decoded frame payload.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the value does not match the request
    /// schema.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Response returned to the extension.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Response {
    /// Correlation id copied from the request.
    pub id: String,
    /// Whether the command completed successfully.
    pub success: bool,
    /// Command result, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Human-readable error text, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable failure code, e.g. a session status name.
    #[serde(default, rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            id: id.into(),
            success: true,
            result,
            error: None,
            error_code: None,
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            error_code: None,
        }
    }

    /// Builds a failure response carrying a machine-readable code.
    #[must_use]
    pub fn failure_with_code(
        id: impl Into<String>,
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error_code: Some(code.into()),
            ..Self::failure(id, error)
        }
    }

    /// Serializes the response for the wire.
    ///
    /// # Errors
    ///
    /// Returns the serde error when serialization fails; this does not occur
    /// for responses built from parsed JSON.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_request_with_command_field() {
        let request = Request::from_value(json!({
            "id": "req-1",
            "command": "unlock",
            "params": {"passphrase": "hunter2"},
        }))
        .expect("parse");
        assert_eq!(request.id, "req-1");
        assert_eq!(request.command, "unlock");
        assert!(request.params.is_some());
    }

    #[test]
    fn parses_request_with_legacy_method_field() {
        let request = Request::from_value(json!({"id": "req-2", "method": "lock"}))
            .expect("parse legacy shape");
        assert_eq!(request.command, "lock");
        assert!(request.params.is_none());
    }

    #[test]
    fn missing_id_defaults_to_empty() {
        let request = Request::from_value(json!({"command": "status"})).expect("parse");
        assert_eq!(request.id, "");
    }

    #[test]
    fn rejects_request_without_command() {
        assert!(Request::from_value(json!({"id": "req-3"})).is_err());
    }

    #[test]
    fn success_response_omits_error_fields() {
        let response = Response::success("req-1", Some(json!({"ok": true})));
        let wire = response.to_value().expect("serialize");
        assert_eq!(wire["success"], json!(true));
        assert!(wire.get("error").is_none());
        assert!(wire.get("errorCode").is_none());
    }

    #[test]
    fn failure_response_carries_code() {
        let response = Response::failure_with_code("req-1", "backend not running", "unreachable");
        let wire = response.to_value().expect("serialize");
        assert_eq!(wire["success"], json!(false));
        assert_eq!(wire["error"], json!("backend not running"));
        assert_eq!(wire["errorCode"], json!("unreachable"));
        assert!(wire.get("result").is_none());
    }
}
