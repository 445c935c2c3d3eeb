//! Raw TCP transport
//!
//! One persistent connection per run carrying newline-delimited JSON-RPC 2.0.
//! The connection must be authenticated with `Meta.Authenticate` before any
//! other call; later calls rely on that state and do not repeat the secret.

use async_trait::async_trait;
use diag_protocol::butlerd::{methods, AuthenticateParams};
use diag_protocol::{
    InboundMessage, JsonLinesCodec, ProtocolError, RpcReply, RpcRequest, Secret, TransportKind,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use super::{Transport, TransportOptions};
use crate::context::RunContext;
use crate::error::{CallError, TransportError};

pub struct TcpTransport {
    framed: Framed<TcpStream, JsonLinesCodec<InboundMessage>>,
    address: String,
    secret: Secret,
    options: TransportOptions,
    authenticated: bool,
}

impl TcpTransport {
    /// Open the connection, bounded by the connect timeout
    pub async fn connect(
        address: &str,
        secret: Secret,
        options: &TransportOptions,
    ) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                address: address.to_string(),
                timeout: options.connect_timeout,
            })?
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::trace!("Could not set TCP_NODELAY: {}", e);
        }

        Ok(Self {
            framed: Framed::new(stream, JsonLinesCodec::with_max_length(options.max_line_length)),
            address: address.to_string(),
            secret,
            options: options.clone(),
            authenticated: false,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Write one request and read the reply that answers it
    async fn round_trip(
        &mut self,
        ctx: &mut RunContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CallError> {
        let id = ctx.next_id();
        tracing::debug!(%id, method, "TCP call");

        self.framed
            .send(RpcRequest::new(id, method, params))
            .await
            .map_err(codec_error)?;

        let reply = tokio::time::timeout(self.options.call_timeout, self.read_reply(ctx))
            .await
            .map_err(|_| TransportError::Timeout {
                method: method.to_string(),
                timeout: self.options.call_timeout,
            })??;

        Ok(reply.into_result(id)?)
    }

    /// Next reply line, skipping notifications the daemon sends meanwhile
    async fn read_reply(&mut self, ctx: &mut RunContext) -> Result<RpcReply, CallError> {
        loop {
            match self.framed.next().await {
                None => return Err(TransportError::Closed.into()),
                Some(Err(e)) => return Err(codec_error(e)),
                Some(Ok(InboundMessage::Reply(reply))) => return Ok(reply),
                Some(Ok(InboundMessage::Notification { method, params })) => {
                    ctx.sink().debug(&format!(
                        "[butlerd] {} {}",
                        method,
                        params.map(|p| p.to_string()).unwrap_or_default()
                    ));
                }
                Some(Ok(InboundMessage::Request { id, method, .. })) => {
                    return Err(CallError::ProtocolViolation(format!(
                        "daemon sent request {} ({}) while a reply was expected",
                        method, id
                    )));
                }
            }
        }
    }
}

/// Unparseable reply lines are decode failures; the rest are transport failures
fn codec_error(err: ProtocolError) -> CallError {
    match err {
        ProtocolError::Json(e) => CallError::Decode {
            method: "reply".to_string(),
            reason: e.to_string(),
        },
        other => TransportError::Codec(other).into(),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn authenticate(&mut self, ctx: &mut RunContext) -> Result<(), CallError> {
        let params = AuthenticateParams {
            secret: self.secret.clone(),
        };
        let params = serde_json::to_value(params)
            .map_err(|e| TransportError::Codec(ProtocolError::Json(e)))?;

        self.round_trip(ctx, methods::META_AUTHENTICATE, Some(params))
            .await?;
        self.authenticated = true;
        tracing::debug!(address = %self.address, "Connection authenticated");
        Ok(())
    }

    async fn call(
        &mut self,
        ctx: &mut RunContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CallError> {
        if !self.authenticated {
            return Err(TransportError::NotAuthenticated.into());
        }
        self.round_trip(ctx, method, params).await
    }

    async fn close(&mut self) {
        if let Err(e) = SinkExt::<RpcRequest>::close(&mut self.framed).await {
            tracing::trace!("Error closing TCP transport: {}", e);
        }
    }
}
