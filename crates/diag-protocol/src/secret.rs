//! Bearer secret announced by the daemon

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque credential that must accompany every call to the daemon.
///
/// `Debug` and `Display` only ever show a redacted form; use [`Secret::expose`]
/// at the single point where the value is put on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A form that is safe to log: at most the first two characters survive
    pub fn redacted(&self) -> String {
        if self.0.chars().count() <= 4 {
            return "****".to_string();
        }
        let prefix: String = self.0.chars().take(2).collect();
        format!("{}****", prefix)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
