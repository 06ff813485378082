//! Wire envelopes for the RPC protocol.
//!
//! Requests and responses are correlated by an opaque, client-chosen `id`.
//! The same structs serve both wire faces: JSON for text frames and
//! MessagePack for binary frames (field names are preserved in both).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// The protocol version the daemon accepts.
pub const PROTOCOL_VERSION: &str = "1.0";

/// How a request wants to be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// One request, one response.
    #[default]
    Call,
    /// Open an event stream; the first response is the acknowledgment.
    Subscribe,
    /// Tear down a previously opened stream.
    Unsubscribe,
}

/// An inbound RPC request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Declared protocol version; the daemon accepts [`PROTOCOL_VERSION`].
    pub version: String,
    /// Opaque client-chosen correlation token.
    pub id: String,
    /// The virtual path being addressed, e.g. `/status`.
    pub path: String,
    /// Client-supplied payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Lifecycle operation; absent means `call`.
    #[serde(rename = "type", default)]
    pub kind: RequestKind,
}

impl Request {
    /// Creates a request with the current protocol version.
    pub fn new(id: impl Into<String>, path: impl Into<String>, kind: RequestKind) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id: id.into(),
            path: path.into(),
            data: None,
            kind,
        }
    }

    /// Attaches a payload to the request.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// An outbound RPC response frame.
///
/// Final call responses and subscription acknowledgments carry `status`;
/// streamed subscription events omit it. `statusCode` is only present on
/// error frames and carries the symbolic taxonomy code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation token copied from the request.
    pub id: String,
    /// HTTP-style numeric status; absent on streamed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Symbolic error code; present on error frames only.
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    /// The response body: an object or primitive on success, an error string
    /// on error classes.
    pub message: Value,
}

impl ResponseFrame {
    /// A final response carrying a status and body.
    pub fn result(id: impl Into<String>, status: u16, message: Value) -> Self {
        Self {
            id: id.into(),
            status: Some(status),
            status_code: None,
            message,
        }
    }

    /// A streamed subscription event (no status).
    pub fn event(id: impl Into<String>, message: Value) -> Self {
        Self {
            id: id.into(),
            status: None,
            status_code: None,
            message,
        }
    }

    /// An error response serializing the taxonomy error.
    pub fn error(id: impl Into<String>, err: &DispatchError) -> Self {
        Self {
            id: id.into(),
            status: Some(err.status()),
            status_code: Some(err.code().to_string()),
            message: Value::String(err.to_string()),
        }
    }

    /// Whether the frame belongs to a success class (`2xx`).
    pub fn is_success(&self) -> bool {
        self.status.is_none_or(|s| (200..300).contains(&s))
    }
}
