//! Call dispatch shared by both transports

use diag_protocol::butlerd::{methods, AuthenticateParams, Profile, User};
use diag_protocol::{CallId, RpcReply, Secret};
use serde_json::{json, Value};

use crate::mode::Mode;

/// JSON-RPC error codes used by the stub
pub mod codes {
    pub const INVALID_PARAMS: i64 = -32602;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INTERNAL: i64 = -32603;
    pub const NOT_AUTHENTICATED: i64 = -32000;
}

/// What to do with one call
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Reply(RpcReply),
    /// Write a body that is not JSON
    Garbage,
    /// Fail at the transport level (HTTP 500, dropped TCP connection)
    ServerError,
    /// Never answer
    Hang,
}

/// State of one stub daemon
#[derive(Debug, Clone)]
pub struct StubDaemon {
    mode: Mode,
    secret: Secret,
    profiles: Vec<Profile>,
}

impl StubDaemon {
    pub fn new(mode: Mode, secret: Secret, profile_names: &[String]) -> Self {
        let profiles = profile_names
            .iter()
            .filter(|name| !name.trim().is_empty())
            .enumerate()
            .map(|(i, name)| Profile {
                id: i as i64 + 1,
                user: User {
                    display_name: name.trim().to_string(),
                    username: name.trim().to_lowercase().replace(' ', "_"),
                },
                last_connected: "2026-10-01T12:00:00Z".to_string(),
            })
            .collect();

        Self {
            mode,
            secret,
            profiles,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Whether `candidate` is this daemon's secret
    pub fn accepts(&self, candidate: &str) -> bool {
        candidate == self.secret.expose()
    }

    /// Answer `Meta.Authenticate`
    pub fn authenticate(&self, id: CallId, params: Option<&Value>) -> RpcReply {
        let params = params
            .cloned()
            .and_then(|p| serde_json::from_value::<AuthenticateParams>(p).ok());

        match params {
            Some(p) if self.accepts(p.secret.expose()) => RpcReply::success(id, json!({})),
            Some(_) => RpcReply::failure(id, codes::INVALID_PARAMS, "incorrect secret"),
            None => RpcReply::failure(id, codes::INVALID_PARAMS, "missing secret"),
        }
    }

    /// Answer a call on an authenticated connection
    pub fn answer(&self, id: CallId, method: &str) -> Answer {
        match method {
            methods::META_AUTHENTICATE => Answer::Reply(RpcReply::success(id, json!({}))),
            methods::PROFILE_LIST => match self.mode {
                Mode::AppError => Answer::Reply(RpcReply::failure(
                    id,
                    codes::INTERNAL,
                    "database is locked",
                )),
                Mode::Garbage => Answer::Garbage,
                Mode::ServerError => Answer::ServerError,
                Mode::Slow => Answer::Hang,
                _ => Answer::Reply(RpcReply::success(
                    id,
                    json!({ "profiles": self.profiles }),
                )),
            },
            other => Answer::Reply(RpcReply::failure(
                id,
                codes::METHOD_NOT_FOUND,
                format!("no such method: {}", other),
            )),
        }
    }
}
