//! Failure modes

use std::fmt;
use std::str::FromStr;

/// How the stub behaves once launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Announce and answer like a healthy daemon
    #[default]
    Normal,
    /// Never announce
    Silent,
    /// Log a fatal error and exit before announcing
    Exit,
    /// Announce without a secret
    NoSecret,
    /// Answer `Profile.List` with an application error
    AppError,
    /// Answer `Profile.List` with something that is not JSON
    Garbage,
    /// Answer HTTP calls with a bare 500 (TCP connections are dropped)
    ServerError,
    /// Accept `Profile.List` but never answer it
    Slow,
}

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::Normal,
        Mode::Silent,
        Mode::Exit,
        Mode::NoSecret,
        Mode::AppError,
        Mode::Garbage,
        Mode::ServerError,
        Mode::Slow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Silent => "silent",
            Mode::Exit => "exit",
            Mode::NoSecret => "no-secret",
            Mode::AppError => "app-error",
            Mode::Garbage => "garbage",
            Mode::ServerError => "server-error",
            Mode::Slow => "slow",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown stub mode '{}'", s))
    }
}
