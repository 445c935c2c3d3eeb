//! diag-core: Shared plumbing for itch-diag
//!
//! This crate provides configuration, the error types for configuration and
//! filesystem preconditions, resolution of the itch/butler install layout,
//! the diagnostic sink abstraction and the labeled check harness the probe
//! reports into.

pub mod config;
pub mod error;
pub mod harness;
pub mod layout;
pub mod process;
pub mod traits;
pub mod types;

pub use error::{ConfigError, PreconditionError};
pub use harness::{CheckHarness, CheckOutcome};
pub use layout::ItchLayout;
pub use traits::{DiagnosticSink, MemorySink, TracingSink};
pub use types::Level;
