//! Error types for a probe run
//!
//! Every failure of a run is terminal. It is reported as a [`ProbeFailure`]
//! carrying the phase it happened in, so callers can tell a daemon that never
//! started from one that never announced itself, one that could not be
//! reached, and one that answered with an error.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use diag_core::PreconditionError;
use diag_protocol::{HandshakeError, ProtocolError, ReplyError, RpcErrorObject};
use thiserror::Error;

/// The daemon process could not be launched
#[derive(Error, Debug)]
#[error("could not start {}: {source}", executable.display())]
pub struct SpawnError {
    pub executable: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failures talking to the daemon below the JSON-RPC layer
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection was refused or otherwise failed to open
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Opening the connection took too long
    #[error("connecting to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    /// No reply arrived in time
    #[error("no reply to {method} within {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    /// The daemon closed the connection
    #[error("connection closed by daemon")]
    Closed,

    /// A business call was attempted before `Meta.Authenticate` succeeded
    #[error("connection is not authenticated")]
    NotAuthenticated,

    /// Framing failure on the socket
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// The HTTP endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP client failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a single call
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon answered with an error object
    #[error("daemon returned an error: {0}")]
    Application(RpcErrorObject),

    /// The reply did not have the expected shape
    #[error("could not decode reply to {method}: {reason}")]
    Decode { method: String, reason: String },

    /// The reply broke the request/reply contract
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl From<ReplyError> for CallError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::Application(error) => CallError::Application(error),
            other => CallError::ProtocolViolation(other.to_string()),
        }
    }
}

/// Everything that can end a probe run
#[derive(Error, Debug)]
pub enum ProbeError {
    /// A required file is missing
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The daemon process failed to start
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The listen notification was recognised but unusable
    #[error("bad listen notification: {0}")]
    Detection(#[from] HandshakeError),

    /// The daemon did not announce itself in time
    #[error("no listen notification within {0:?}")]
    Timeout(Duration),

    /// The daemon went away before announcing itself
    #[error("daemon {0} before announcing itself")]
    DaemonExited(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon is up and answered with an error
    #[error("daemon returned an error: {0}")]
    Application(RpcErrorObject),

    #[error("could not decode reply to {method}: {reason}")]
    Decode { method: String, reason: String },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The run was cancelled by the caller
    #[error("cancelled")]
    Cancelled,
}

impl From<CallError> for ProbeError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(e) => ProbeError::Transport(e),
            CallError::Application(e) => ProbeError::Application(e),
            CallError::Decode { method, reason } => ProbeError::Decode { method, reason },
            CallError::ProtocolViolation(msg) => ProbeError::ProtocolViolation(msg),
        }
    }
}

/// Phase a run was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Precondition,
    Launching,
    AwaitingHandshake,
    Connecting,
    Verifying,
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbePhase::Precondition => write!(f, "checking preconditions"),
            ProbePhase::Launching => write!(f, "launching daemon"),
            ProbePhase::AwaitingHandshake => write!(f, "waiting for handshake"),
            ProbePhase::Connecting => write!(f, "connecting"),
            ProbePhase::Verifying => write!(f, "verifying"),
        }
    }
}

/// Coarse diagnosis of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The daemon could not be started at all
    NeverStarted,
    /// The daemon started but never gave a usable address
    NeverAnnounced,
    /// The daemon announced an address that could not be used
    Unreachable,
    /// The daemon answered, but not with a well-formed reply
    InvalidReply,
    /// The daemon answered with an application error
    ApplicationError,
    Cancelled,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureCategory::NeverStarted => "daemon never started",
            FailureCategory::NeverAnnounced => "daemon never announced",
            FailureCategory::Unreachable => "daemon announced but is unreachable",
            FailureCategory::InvalidReply => "daemon sent an invalid reply",
            FailureCategory::ApplicationError => "daemon answered with an error",
            FailureCategory::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// A failed run: the phase it reached and what went wrong
#[derive(Error, Debug)]
#[error("{phase}: {error}")]
pub struct ProbeFailure {
    pub phase: ProbePhase,
    #[source]
    pub error: ProbeError,
}

impl ProbeFailure {
    pub fn new(phase: ProbePhase, error: impl Into<ProbeError>) -> Self {
        Self {
            phase,
            error: error.into(),
        }
    }

    pub fn category(&self) -> FailureCategory {
        match &self.error {
            ProbeError::Precondition(_) | ProbeError::Spawn(_) => FailureCategory::NeverStarted,
            ProbeError::Detection(_) | ProbeError::Timeout(_) | ProbeError::DaemonExited(_) => {
                FailureCategory::NeverAnnounced
            }
            ProbeError::Transport(_) => FailureCategory::Unreachable,
            ProbeError::Decode { .. } | ProbeError::ProtocolViolation(_) => {
                FailureCategory::InvalidReply
            }
            ProbeError::Application(_) => FailureCategory::ApplicationError,
            ProbeError::Cancelled => FailureCategory::Cancelled,
        }
    }
}

/// Failures running a short-lived command to completion
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("exited with {status}: {output}")]
    Failed { status: String, output: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_protocol::CallId;

    #[test]
    fn test_reply_errors_map_to_call_errors() {
        let mismatch = ReplyError::IdMismatch {
            expected: CallId::new(1),
            got: CallId::new(7),
        };
        assert!(matches!(CallError::from(mismatch), CallError::ProtocolViolation(_)));

        let app = ReplyError::Application(RpcErrorObject {
            code: -32601,
            message: "no such method".into(),
            data: None,
        });
        assert!(matches!(CallError::from(app), CallError::Application(e) if e.code == -32601));
    }

    #[test]
    fn test_categories() {
        let cases = [
            (ProbeError::Timeout(Duration::from_secs(5)), FailureCategory::NeverAnnounced),
            (ProbeError::Detection(HandshakeError::MissingSecret), FailureCategory::NeverAnnounced),
            (ProbeError::Transport(TransportError::Closed), FailureCategory::Unreachable),
            (ProbeError::ProtocolViolation("x".into()), FailureCategory::InvalidReply),
            (ProbeError::Cancelled, FailureCategory::Cancelled),
        ];
        for (error, expected) in cases {
            assert_eq!(ProbeFailure::new(ProbePhase::Verifying, error).category(), expected);
        }
    }

    #[test]
    fn test_failure_display_names_phase() {
        let failure = ProbeFailure::new(
            ProbePhase::AwaitingHandshake,
            ProbeError::Timeout(Duration::from_secs(5)),
        );
        assert_eq!(
            failure.to_string(),
            "waiting for handshake: no listen notification within 5s"
        );
    }
}
