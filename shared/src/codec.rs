//! JSON codec for the command channel
//!
//! Inbound frames are single JSON objects:
//! ```text
//! { "id"?: number|string|null, "method"?: string, "params"?: object,
//!   "result"?: any, "error"?: any }
//! ```
//! Replies echo the request id and carry either `result` or
//! `error: { "message": ... }`. The id is omitted when none was recoverable.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Inbound, Request, RequestId, ResponseKind};

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,
}

/// Parse a text frame and classify it.
///
/// The id is taken before anything else so that later failures can still be
/// answered.
pub fn parse_frame(text: &str) -> Result<Inbound, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut obj) = value else {
        return Err(CodecError::NotAnObject);
    };

    let id = obj.get("id").and_then(RequestId::from_json);

    let method = match obj.remove("method") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(m)) => m,
        Some(other) => {
            return Ok(Inbound::Invalid {
                id,
                reason: format!("method must be a string, got {}", json_kind(&other)),
            });
        }
    };

    if method.is_empty() {
        return Ok(classify_response(id, obj));
    }

    let params = match obj.remove("params") {
        Some(Value::Object(params)) => params,
        _ => Map::new(),
    };

    Ok(Inbound::Request(Request { id, method, params }))
}

fn classify_response(id: Option<RequestId>, mut obj: Map<String, Value>) -> Inbound {
    if obj.contains_key("result") {
        Inbound::Response {
            id,
            kind: ResponseKind::Result,
        }
    } else if let Some(error) = obj.remove("error") {
        Inbound::Response {
            id,
            kind: ResponseKind::Error(error),
        }
    } else {
        Inbound::Unclassified { id }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Error payload of a failed reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    pub message: String,
}

/// Success or failure half of a reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyBody {
    Result(Value),
    Error(ErrorObject),
}

/// Reply frame sent back to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub body: ReplyBody,
}

impl Reply {
    /// Create a success reply
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            id,
            body: ReplyBody::Result(result),
        }
    }

    /// Create an error reply
    pub fn failure(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            id,
            body: ReplyBody::Error(ErrorObject {
                message: message.into(),
            }),
        }
    }
}

/// Encode a reply into its wire text
pub fn encode_reply(reply: &Reply) -> Result<String, CodecError> {
    Ok(serde_json::to_string(reply)?)
}
