//! HTTP plumbing
//!
//! Requests are plain values so an [`AuthProvider`](crate::AuthProvider) can
//! decorate them and a [`KasTransport`] can send them. Retries and backoff
//! belong to the transport; nothing above it retries.

use crate::error::NanoTdfError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers,
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            headers,
            body: Some(body.into()),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Response status and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to KAS and platform endpoints
///
/// Implementations report connection failures as [`NanoTdfError::Network`]
/// and return every HTTP status, successful or not, as a response.
#[async_trait]
pub trait KasTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NanoTdfError>;
}

/// [`KasTransport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    /// Transport with a 30 second request timeout
    pub fn new() -> Result<Self, NanoTdfError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NanoTdfError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Transport over an existing client
    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl KasTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NanoTdfError> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let mut builder = match request.method {
            HttpMethod::Get => self.http_client.get(&request.url),
            HttpMethod::Post => self.http_client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            NanoTdfError::Network(format!("unable to reach [{}]: {}", request.url, e))
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            NanoTdfError::Network(format!("unable to read response from [{}]: {}", request.url, e))
        })?;

        Ok(HttpResponse { status, body })
    }
}
