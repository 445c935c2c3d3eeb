//! JSON-RPC envelopes
//!
//! The TCP transport writes one [`RpcRequest`] per line and reads one
//! [`InboundMessage`] per line. The HTTP transport reuses [`RpcReply`] for its
//! response bodies, which carry the same `id`/`result`/`error` triple.
//!
//! Replies are validated against the request that produced them with
//! [`RpcReply::into_result`]: the identifier must match and a reply may carry
//! a result or an error, never both.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::call_id::CallId;

/// Protocol version tag carried by every request
pub const JSONRPC_VERSION: &str = "2.0";

/// A call from the client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always [`JSONRPC_VERSION`]
    pub jsonrpc: String,
    /// Correlates the reply
    pub id: CallId,
    /// Method name, e.g. `Profile.List`
    pub method: String,
    /// Parameters, serialized as `null` when absent
    #[serde(default)]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Create a new request
    pub fn new(id: CallId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error object of a failed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code
    #[serde(default)]
    pub code: i64,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Additional data (butler puts stack traces here)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "error code {}", self.code)
        } else {
            write!(f, "{} (code {})", self.message, self.code)
        }
    }
}

/// Reply to a single call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcReply {
    /// Identifier of the request this answers
    pub id: CallId,
    /// Result payload, if the call succeeded
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload, if the call failed. `{}` counts as no error.
    #[serde(
        default,
        deserialize_with = "non_empty_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<RpcErrorObject>,
}

impl RpcReply {
    /// Successful reply
    pub fn success(id: CallId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply
    pub fn failure(id: CallId, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Validate this reply against the request it should answer and extract
    /// its result. A reply with neither result nor error yields `null`.
    pub fn into_result(self, expected: CallId) -> Result<Value, ReplyError> {
        if self.id != expected {
            return Err(ReplyError::IdMismatch {
                expected,
                got: self.id,
            });
        }

        match (self.result, self.error) {
            (Some(_), Some(_)) => Err(ReplyError::Ambiguous { id: self.id }),
            (_, Some(error)) => Err(ReplyError::Application(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Reads an `error` field, treating `null` and `{}` as absent
fn non_empty_error<'de, D>(deserializer: D) -> Result<Option<RpcErrorObject>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Why a reply could not be turned into a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplyError {
    /// The reply answers a different request
    #[error("reply id {got} does not match request id {expected}")]
    IdMismatch { expected: CallId, got: CallId },

    /// The reply carries both a result and an error
    #[error("reply {id} carries both a result and an error")]
    Ambiguous { id: CallId },

    /// The daemon reported an application error
    #[error("daemon returned an error: {0}")]
    Application(RpcErrorObject),
}

/// Anything the daemon may write on a JSON-RPC connection
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawInbound")]
pub enum InboundMessage {
    /// Answer to one of our requests
    Reply(RpcReply),
    /// Fire-and-forget message from the daemon (e.g. `Log`)
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// A call the daemon expects us to answer
    Request {
        id: CallId,
        method: String,
        params: Option<Value>,
    },
}

#[derive(Deserialize)]
struct RawInbound {
    #[serde(default)]
    id: Option<CallId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default, deserialize_with = "non_empty_error")]
    error: Option<RpcErrorObject>,
}

impl TryFrom<RawInbound> for InboundMessage {
    type Error = String;

    fn try_from(raw: RawInbound) -> Result<Self, Self::Error> {
        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Ok(InboundMessage::Request {
                id,
                method,
                params: raw.params,
            }),
            (None, Some(method)) => Ok(InboundMessage::Notification {
                method,
                params: raw.params,
            }),
            (Some(id), None) => Ok(InboundMessage::Reply(RpcReply {
                id,
                result: raw.result,
                error: raw.error,
            })),
            (None, None) => match raw.error {
                Some(error) => Err(format!("daemon reported an uncorrelated error: {}", error)),
                None => Err("message has neither an id nor a method".to_string()),
            },
        }
    }
}
