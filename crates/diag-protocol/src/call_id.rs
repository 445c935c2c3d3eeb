//! Call identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier correlating a JSON-RPC reply with the request that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub i64);

impl CallId {
    /// Create a new call ID
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// The identifier issued after this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// First identifier issued on a fresh run
    pub const FIRST: CallId = CallId(0);
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CallId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
