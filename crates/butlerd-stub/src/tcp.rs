//! Newline-delimited JSON-RPC over TCP

use std::sync::Arc;

use diag_protocol::butlerd::methods;
use diag_protocol::{JsonLinesCodec, ProtocolError, RpcReply, RpcRequest};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

use crate::daemon::{codes, Answer, StubDaemon};

/// Accept connections until the process is killed
pub async fn serve_tcp(listener: TcpListener, daemon: Arc<StubDaemon>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "Connection accepted");

        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &daemon).await {
                tracing::debug!(%peer, "Connection ended: {}", e);
            }
        });
    }
}

/// `Log` notification sent ahead of every reply
fn log_notification(method: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "Log",
        "params": { "level": "debug", "message": format!("handling {}", method) },
    })
}

async fn handle_connection(stream: TcpStream, daemon: &StubDaemon) -> Result<(), ProtocolError> {
    stream.set_nodelay(true)?;
    let mut framed = Framed::new(stream, JsonLinesCodec::<RpcRequest>::new());
    let mut authenticated = false;

    while let Some(request) = framed.next().await {
        let request = request?;
        framed.send(log_notification(&request.method)).await?;

        if request.method == methods::META_AUTHENTICATE {
            let reply = daemon.authenticate(request.id, request.params.as_ref());
            authenticated = reply.error.is_none();
            framed.send(reply).await?;
            continue;
        }

        if !authenticated {
            framed
                .send(RpcReply::failure(
                    request.id,
                    codes::NOT_AUTHENTICATED,
                    "call Meta.Authenticate first",
                ))
                .await?;
            continue;
        }

        match daemon.answer(request.id, &request.method) {
            Answer::Reply(reply) => framed.send(reply).await?,
            Answer::Garbage => framed.get_mut().write_all(b"<<not json>>\n").await?,
            Answer::ServerError => return Ok(()),
            Answer::Hang => std::future::pending::<()>().await,
        }
    }

    Ok(())
}
