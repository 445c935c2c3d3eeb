//! HTTP transport
//!
//! Every call is an independent `POST http://<address>/call/<Method>` with the
//! call id in `X-ID` and the secret in `X-Secret`. The body is the JSON
//! params, or `{}` when there are none.

use async_trait::async_trait;
use diag_protocol::{RpcReply, Secret, TransportKind};
use serde_json::Value;

use super::{Transport, TransportOptions};
use crate::context::RunContext;
use crate::error::{CallError, TransportError};

/// Longest slice of an error body kept in a status error
const BODY_SNIPPET_LEN: usize = 256;

pub struct HttpTransport {
    client: reqwest::Client,
    address: String,
    base_url: String,
    secret: Secret,
    options: TransportOptions,
}

impl HttpTransport {
    pub fn new(
        address: &str,
        secret: Secret,
        options: &TransportOptions,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.call_timeout)
            .build()?;

        Ok(Self {
            client,
            address: address.to_string(),
            base_url: format!("http://{}", address),
            secret,
            options: options.clone(),
        })
    }

    fn request_error(&self, method: &str, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                method: method.to_string(),
                timeout: self.options.call_timeout,
            }
        } else {
            TransportError::Http(err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn authenticate(&mut self, _ctx: &mut RunContext) -> Result<(), CallError> {
        // The secret travels with every request
        Ok(())
    }

    async fn call(
        &mut self,
        ctx: &mut RunContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CallError> {
        let id = ctx.next_id();
        let url = format!("{}/call/{}", self.base_url, method);
        let body = params.unwrap_or_else(|| Value::Object(Default::default()));

        tracing::debug!(%id, method, "HTTP call");

        let response = self
            .client
            .post(&url)
            .header("X-ID", id.to_string())
            .header("X-Secret", self.secret.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(method, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.request_error(method, e))?;

        let parsed = serde_json::from_slice::<RpcReply>(&bytes);

        if !status.is_success() {
            // An error envelope means the daemon itself answered
            if let Ok(reply) = parsed {
                if reply.error.is_some() {
                    if let Err(e) = reply.into_result(id) {
                        return Err(e.into());
                    }
                }
            }
            let text = String::from_utf8_lossy(&bytes);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text.chars().take(BODY_SNIPPET_LEN).collect(),
            }
            .into());
        }

        let reply = parsed.map_err(|e| CallError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;
        Ok(reply.into_result(id)?)
    }

    async fn close(&mut self) {
        tracing::trace!(address = %self.address, "HTTP transport closed");
    }
}
