//! Handshake notification printed by `butler --json daemon`
//!
//! With `--json`, every line butler writes to stdout is a JSON object with a
//! `type` field. Exactly one of them, `butlerd/listen-notification`, tells the
//! client where the daemon listens and which secret it expects:
//!
//! ```text
//! {"type":"butlerd/listen-notification","secret":"...","tcp":{"address":"127.0.0.1:9999"}}
//! {"type":"butlerd/listen-notification","secret":"...","http":{"address":"127.0.0.1:9999"}}
//! ```
//!
//! Anything that is not a JSON object with a string `type` is noise and must
//! be tolerated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::secret::Secret;

/// `type` value of the listen notification
pub const LISTEN_NOTIFICATION: &str = "butlerd/listen-notification";

/// `type` value of butler's structured log lines
pub const LOG_LINE: &str = "log";

/// Transport the daemon announced in its listen notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC over a persistent TCP connection
    Tcp,
    /// One HTTP POST per call
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "http" => Ok(TransportKind::Http),
            other => Err(format!("unknown transport '{}' (expected tcp or http)", other)),
        }
    }
}

/// Connection parameters extracted from a listen notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    /// Which transport the address belongs to
    pub transport: TransportKind,
    /// `host:port` the daemon listens on
    pub address: String,
    /// Secret that must accompany every call
    pub secret: Secret,
}

/// A listen notification that was recognised but could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// No `secret` field, or an empty one
    #[error("listen notification has no secret")]
    MissingSecret,

    /// Neither a `tcp` nor an `http` sub-object with a non-empty `address`
    #[error("listen notification has no tcp or http address")]
    MissingAddress,

    /// Fields present but of the wrong shape
    #[error("malformed listen notification: {0}")]
    Malformed(String),
}

/// A classified line of daemon output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonLine {
    /// The daemon announced its address and secret
    Listen(HandshakeMessage),
    /// A structured log entry
    Log { level: String, message: String },
    /// Some other structured message, identified by its `type`
    Other(String),
}

#[derive(Deserialize)]
struct TypedLine {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ListenNotificationWire {
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    tcp: Option<AddressWire>,
    #[serde(default)]
    http: Option<AddressWire>,
}

#[derive(Deserialize)]
struct AddressWire {
    #[serde(default)]
    address: Option<String>,
}

#[derive(Deserialize)]
struct LogLineWire {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AddressWire {
    fn non_empty(self) -> Option<String> {
        self.address.filter(|a| !a.trim().is_empty())
    }
}

impl TryFrom<ListenNotificationWire> for HandshakeMessage {
    type Error = HandshakeError;

    fn try_from(wire: ListenNotificationWire) -> Result<Self, Self::Error> {
        let secret = wire
            .secret
            .filter(|s| !s.is_empty())
            .ok_or(HandshakeError::MissingSecret)?;

        // tcp wins when a daemon announces both
        let (transport, address) = match (
            wire.tcp.and_then(AddressWire::non_empty),
            wire.http.and_then(AddressWire::non_empty),
        ) {
            (Some(address), _) => (TransportKind::Tcp, address),
            (None, Some(address)) => (TransportKind::Http, address),
            (None, None) => return Err(HandshakeError::MissingAddress),
        };

        Ok(HandshakeMessage {
            transport,
            address,
            secret: Secret::new(secret),
        })
    }
}

/// Classify one line of daemon stdout.
///
/// Returns `Ok(None)` for noise (non-JSON, or JSON without a string `type`),
/// and `Err` only for a line that claims to be a listen notification but
/// cannot be used.
pub fn parse_daemon_line(line: &str) -> Result<Option<DaemonLine>, HandshakeError> {
    let line = line.trim();
    if !line.starts_with('{') {
        return Ok(None);
    }

    let typed: TypedLine = match serde_json::from_str(line) {
        Ok(typed) => typed,
        Err(_) => return Ok(None),
    };

    match typed.kind.as_str() {
        LISTEN_NOTIFICATION => {
            let wire: ListenNotificationWire = serde_json::from_str(line)
                .map_err(|e| HandshakeError::Malformed(e.to_string()))?;
            HandshakeMessage::try_from(wire).map(|msg| Some(DaemonLine::Listen(msg)))
        }
        LOG_LINE => match serde_json::from_str::<LogLineWire>(line) {
            Ok(LogLineWire {
                level,
                message: Some(message),
            }) => Ok(Some(DaemonLine::Log {
                level: level.unwrap_or_else(|| "info".to_string()),
                message,
            })),
            _ => Ok(Some(DaemonLine::Other(typed.kind))),
        },
        _ => Ok(Some(DaemonLine::Other(typed.kind))),
    }
}
