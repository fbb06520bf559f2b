//! Shared outbound HTTP client for all adapters.
//!
//! Two reqwest clients are built up front: one verifying TLS and one
//! accepting invalid certificates. The relaxed client is only reachable
//! through a terminal-level opt-in for legacy acquirer hosts.

use std::time::Duration;

use common_utils::request::{Method, Request};
use error_stack::ResultExt;
use masking::ExposeInterface;

use crate::{api::ConnectorError, types::Response};

/// Client pair for outbound acquirer calls.
#[derive(Clone, Debug)]
pub struct HttpClient {
    verified: reqwest::Client,
    relaxed: reqwest::Client,
}

impl HttpClient {
    /// Build both clients with the given request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self, ConnectorError> {
        let timeout = Duration::from_secs(timeout_secs);
        let verified = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| ConnectorError::RequestFailed)?;
        let relaxed = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|_| ConnectorError::RequestFailed)?;
        Ok(Self { verified, relaxed })
    }

    /// Send a built [`Request`] and collect the raw response. Every
    /// exchange is logged before and after.
    pub async fn send(&self, request: Request) -> error_stack::Result<Response, ConnectorError> {
        let client = if request.allow_invalid_certs {
            &self.relaxed
        } else {
            &self.verified
        };

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
            Method::Put => client.put(&request.url),
            Method::Delete => client.delete(&request.url),
        };

        if let Some(content_type) = request.content_type {
            builder = builder.header("Content-Type", content_type.header_value());
        }
        for (name, value) in request.headers {
            builder = builder.header(&name, value.into_inner());
        }
        if let Some(encoded) = request.encoded_payload {
            builder = builder.body(encoded);
        } else if let Some(payload) = request.payload {
            builder = builder.body(payload.expose());
        }

        tracing::info!(url = %request.url, method = %request.method, "acquirer request");

        let response = builder
            .send()
            .await
            .change_context(ConnectorError::RequestFailed)
            .attach_printable("acquirer call failed or timed out")?;

        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .change_context(ConnectorError::RequestFailed)?;

        tracing::info!(url = %request.url, status_code, "acquirer response");

        Ok(Response { status_code, body })
    }
}
