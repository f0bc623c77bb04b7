use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::chat::ChatRequest;
use crate::config::ChatSettings;

/// What came back from one delivery attempt that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// A failure raised while delivering the request (connect, DNS, timeout, body read).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's Display drops the underlying cause ("error sending request"),
        // so walk the source chain to keep the useful part.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }
}

/// Delivers a single chat request. Implementations never retry on their own.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<TransportReply, TransportError>;
}

/// Production transport: POSTs JSON to the configured chat-completion endpoint.
pub struct HttpChatTransport {
    client: Client,
    endpoint: String,
    auth_token: String,
}

impl HttpChatTransport {
    pub fn new(settings: &ChatSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            auth_token: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, model = %request.model))]
    async fn send(&self, request: &ChatRequest) -> Result<TransportReply, TransportError> {
        // The token goes out exactly as configured; include "Bearer " in it if the
        // endpoint expects that scheme.
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::AUTHORIZATION, &self.auth_token)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, body_len = body.len(), "Received chat-completion response");

        Ok(TransportReply { status, body })
    }
}
