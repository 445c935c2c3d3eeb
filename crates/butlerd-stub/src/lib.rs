//! butlerd-stub: a scriptable stand-in for `butler daemon`
//!
//! Speaks just enough of butlerd to be probed: it prints a listen
//! notification on stdout, then answers `Meta.Authenticate` and
//! `Profile.List` over TCP or HTTP. A [`Mode`] picks which way it misbehaves.

pub mod announce;
pub mod daemon;
pub mod http;
pub mod mode;
pub mod tcp;

pub use daemon::{Answer, StubDaemon};
pub use mode::Mode;
