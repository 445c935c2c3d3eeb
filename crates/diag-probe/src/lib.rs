//! diag-probe: butlerd handshake and RPC verification
//!
//! Launches `butler daemon`, relays its output, detects the listen
//! notification it prints, connects over the announced transport (HTTP or
//! raw TCP) and checks that it answers an authenticated `Profile.List`.

pub mod context;
pub mod detector;
pub mod error;
pub mod probe;
pub mod relay;
pub mod supervisor;
pub mod transport;
pub mod version;

pub use context::RunContext;
pub use detector::{Discovery, HandshakeDetector, HandshakeSlot};
pub use error::{
    CallError, CommandError, FailureCategory, ProbeError, ProbeFailure, ProbePhase, SpawnError,
    TransportError,
};
pub use probe::{Probe, ProbeReport, ProbeState};
pub use relay::{LineDisposition, LineRelay};
pub use supervisor::{DaemonCommand, DaemonExit, DaemonProcess};
pub use transport::{connect_transport, HttpTransport, TcpTransport, Transport, TransportOptions};
pub use version::{butler_version, version_of};
