//! diag-protocol: Wire formats spoken between itch-diag and the butler daemon
//!
//! This crate covers everything that crosses a process or socket boundary:
//! the handshake notification butler prints on stdout, the JSON-RPC envelopes
//! exchanged over TCP or HTTP, and the payloads of the calls the probe issues.

pub mod butlerd;
pub mod call_id;
pub mod codec;
pub mod error;
pub mod handshake;
pub mod rpc;
pub mod secret;

pub use call_id::CallId;
pub use codec::JsonLinesCodec;
pub use error::ProtocolError;
pub use handshake::{parse_daemon_line, DaemonLine, HandshakeError, HandshakeMessage, TransportKind};
pub use rpc::{InboundMessage, ReplyError, RpcErrorObject, RpcReply, RpcRequest};
pub use secret::Secret;
