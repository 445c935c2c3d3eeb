//! itch-diag: command-line diagnostics for the itch app's butler install
//!
//! Provides the `itch-diag` CLI, which inspects the butler install layout,
//! asks butler for its version, and runs the butlerd handshake probe.

pub mod commands;
pub mod output;
