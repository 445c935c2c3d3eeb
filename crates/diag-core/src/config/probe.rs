//! Probe configuration

use diag_protocol::TransportKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// Timeouts and limits applied to a single butlerd probe run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// How long the daemon may take to print its listen notification
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Timeout for opening the connection to the announced address
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Deadline for a single call's reply
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,

    /// How long to wait for the daemon to exit once it has been killed
    #[serde(with = "duration_millis")]
    pub shutdown_grace: Duration,

    /// Deadline for `butler -V`
    #[serde(with = "duration_secs")]
    pub version_timeout: Duration,

    /// Longest daemon output line inspected by the relays
    pub max_line_length: usize,

    /// Transport to request from the daemon with `--transport`.
    ///
    /// Unset means the daemon picks; the probe follows whatever it announces.
    pub transport: Option<TransportKind>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_millis(2000),
            version_timeout: Duration::from_secs(5),
            max_line_length: 64 * 1024,
            transport: None,
        }
    }
}
