use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::{ApiError, NETWORK_MESSAGE};

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Process-wide client; the first caller's timeout sticks.
pub fn http_client(timeout: Duration) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")
    })
}

/// Talks to the real REST API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: &'static Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, req.path);
        let mut builder = self.client.request(req.method.clone(), &url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(token) = &req.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().map_err(|err| {
            tracing::warn!(url = %url, error = %err, "request did not reach the API");
            ApiError::Network(NETWORK_MESSAGE.to_string())
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|err| ApiError::Decode(format!("unreadable body: {err}")))?;
        Ok(ApiResponse { status, body })
    }
}
