//! Transports to a running butler daemon
//!
//! butlerd announces either an HTTP or a raw TCP endpoint. Both are driven
//! through the [`Transport`] trait; wire differences stay inside each
//! implementation.

mod http;
mod tcp;

pub use http::HttpTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use diag_core::config::ProbeConfig;
use diag_protocol::{HandshakeMessage, TransportKind};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{CallError, TransportError};

/// Limits applied to a transport
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    pub max_line_length: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for TransportOptions {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            call_timeout: config.call_timeout,
            max_line_length: config.max_line_length,
        }
    }
}

/// Connection to a butler daemon able to issue calls.
///
/// Calls take `&mut self`: one request is in flight at a time and replies
/// are read in issuance order.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// `host:port` this transport talks to
    fn address(&self) -> &str;

    /// Prove knowledge of the secret before any business call
    async fn authenticate(&mut self, ctx: &mut RunContext) -> Result<(), CallError>;

    /// Issue one call and return its result payload
    async fn call(
        &mut self,
        ctx: &mut RunContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CallError>;

    /// Release the connection
    async fn close(&mut self);
}

/// Issue a call and decode its result into `T`
pub async fn call_typed<T: DeserializeOwned>(
    transport: &mut dyn Transport,
    ctx: &mut RunContext,
    method: &str,
    params: Option<Value>,
) -> Result<T, CallError> {
    let value = transport.call(ctx, method, params).await?;
    serde_json::from_value(value).map_err(|e| CallError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Open the transport the daemon announced
pub async fn connect_transport(
    handshake: &HandshakeMessage,
    options: &TransportOptions,
) -> Result<Box<dyn Transport>, TransportError> {
    tracing::debug!(
        transport = %handshake.transport,
        address = %handshake.address,
        "Connecting to daemon"
    );

    match handshake.transport {
        TransportKind::Tcp => {
            let transport =
                TcpTransport::connect(&handshake.address, handshake.secret.clone(), options).await?;
            Ok(Box::new(transport))
        }
        TransportKind::Http => {
            let transport =
                HttpTransport::new(&handshake.address, handshake.secret.clone(), options)?;
            Ok(Box::new(transport))
        }
    }
}
