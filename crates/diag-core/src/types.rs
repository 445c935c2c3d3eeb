//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Step-by-step detail
    Debug,
    /// Regular findings
    Info,
    /// A check passed
    Success,
    /// Something looks off but the run continues
    Warn,
    /// Something is broken
    Error,
}

impl Level {
    /// Map a butler log level name (`debug`, `info`, `warning`, `error`)
    pub fn from_daemon(level: &str) -> Self {
        match level {
            "debug" | "trace" => Level::Debug,
            "warn" | "warning" => Level::Warn,
            "error" | "fatal" => Level::Error,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Success => write!(f, "success"),
            Level::Warn => write!(f, "warn"),
            Level::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_daemon() {
        assert_eq!(Level::from_daemon("warning"), Level::Warn);
        assert_eq!(Level::from_daemon("debug"), Level::Debug);
        assert_eq!(Level::from_daemon("error"), Level::Error);
        assert_eq!(Level::from_daemon("whatever"), Level::Info);
    }

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Success.to_string(), "success");
    }
}
