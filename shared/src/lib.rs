//! Reverse-link shared protocol types
//!
//! This crate provides the wire types and JSON codec spoken between a device
//! and the remote control host that drives it over the reverse connection.

pub mod codec;
pub mod log;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use codec::{encode_reply, parse_frame, CodecError, Reply, ReplyBody};

/// Protocol constants shared by both ends of the channel
pub mod protocol {
    /// Delay before a reconnect attempt after the link drops
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

    /// Token in the host URL template replaced by the local device id
    pub const DEVICE_ID_PLACEHOLDER: &str = "{deviceId}";

    /// Value sent in `X-Remote-Device-Key` until keys are provisioned
    pub const REMOTE_DEVICE_KEY_PLACEHOLDER: &str = "<placeholder>";

    /// Command routed to the background lane instead of the receive path
    pub const DEFAULT_LONG_RUNNING_METHOD: &str = "install";

    /// Routing prefixes stripped from inbound method names, longest first
    pub const METHOD_PREFIXES: [&str; 3] = ["/action/", "action.", "/"];
}

/// Opaque correlation id linking a request to its reply.
///
/// Numbers keep their exact JSON representation so the reply echoes the
/// same type and value the host sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

impl RequestId {
    /// Recover an id from a raw JSON value. `null` and non-scalar values
    /// carry no usable id.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value.into())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_owned())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Helper for logging an optional id
pub struct DisplayId<'a>(pub Option<&'a RequestId>);

impl fmt::Display for DisplayId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => id.fmt(f),
            None => f.write_str("none"),
        }
    }
}

/// A command request sent by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Map<String, Value>,
}

/// Outcome carried by a frame that answers one of our own requests
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseKind {
    Result,
    Error(Value),
}

/// Classification of a parsed inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Command to dispatch
    Request(Request),
    /// Reply to a request this side sent earlier; terminal, never dispatched
    Response {
        id: Option<RequestId>,
        kind: ResponseKind,
    },
    /// No method, result or error
    Unclassified { id: Option<RequestId> },
    /// Structurally broken request; answered with an error when `id` is known
    Invalid {
        id: Option<RequestId>,
        reason: String,
    },
}

impl Inbound {
    /// Correlation id of the frame, if one was recoverable
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Inbound::Request(req) => req.id.as_ref(),
            Inbound::Response { id, .. }
            | Inbound::Unclassified { id }
            | Inbound::Invalid { id, .. } => id.as_ref(),
        }
    }
}
