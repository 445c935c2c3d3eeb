//! One HTTP POST per call

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use diag_protocol::{CallId, RpcReply};
use tokio::net::TcpListener;

use crate::daemon::{codes, Answer, StubDaemon};

pub fn router(daemon: Arc<StubDaemon>) -> Router {
    Router::new()
        .route("/call/:method", post(handle_call))
        .with_state(daemon)
}

/// Serve until the process is killed
pub async fn serve_http(listener: TcpListener, daemon: Arc<StubDaemon>) -> std::io::Result<()> {
    axum::serve(listener, router(daemon)).await
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn handle_call(
    State(daemon): State<Arc<StubDaemon>>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(id) = header(&headers, "x-id").and_then(|v| v.parse::<i64>().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing X-ID header").into_response();
    };
    let id = CallId(id);
    tracing::debug!(%id, %method, body_len = body.len(), "HTTP call");

    if !header(&headers, "x-secret").is_some_and(|s| daemon.accepts(s)) {
        let reply = RpcReply::failure(id, codes::NOT_AUTHENTICATED, "incorrect secret");
        return (StatusCode::UNAUTHORIZED, Json(reply)).into_response();
    }

    match daemon.answer(id, &method) {
        Answer::Reply(reply) => Json(reply).into_response(),
        Answer::Garbage => "<html>not json</html>".into_response(),
        Answer::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
        Answer::Hang => std::future::pending().await,
    }
}
