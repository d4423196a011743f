// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Completion API client
//
// Responsibilities:
// - Build the streaming chat-completions request from history + config
// - Attach the bearer credential to every request
// - Hand back the raw response byte stream on 2xx
// - Map transport failures, timeouts and non-2xx statuses to UpstreamError
//
// The HTTP transport sits behind `HttpSender` so tests can inject canned
// byte streams without a network.

use crate::config::UpstreamConfig;
use crate::message::ChatMessage;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;

/// Cap on how much of a non-2xx error body is kept for the error message.
const ERROR_BODY_LIMIT: usize = 2048;

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout_ms: Option<u64>,
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HttpError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream request timed out: {0}")]
    Timeout(String),
}

/// Sends a POST and returns the streaming response.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Call-level failures talking to the completion API. Always fatal to the
/// call; never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl From<HttpError> for UpstreamError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) => UpstreamError::Transport(msg),
            HttpError::Timeout(msg) => UpstreamError::Timeout(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

/// Body of `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
    pub stream: bool,
    /// Always serialized, as `null`.
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// UpstreamClient
// ---------------------------------------------------------------------------

/// Explicitly constructed completion API client. One per process, shared by
/// all sessions via `Arc`; holds no per-session state.
pub struct UpstreamClient {
    config: UpstreamConfig,
    http: Arc<dyn HttpSender>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, http: Arc<dyn HttpSender>) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Serialize the streaming request body for `messages`.
    pub fn request_body(&self, messages: &[ChatMessage]) -> Result<Bytes, UpstreamError> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_completion_tokens: self.config.max_completion_tokens,
            top_p: self.config.top_p,
            stream: true,
            stop: None,
            reasoning_effort: self.config.reasoning_effort.as_deref(),
        };
        serde_json::to_vec(&request)
            .map(Bytes::from)
            .map_err(|e| UpstreamError::Transport(format!("failed to encode request: {e}")))
    }

    /// Issue the request and return the response body stream on success.
    ///
    /// A non-2xx status drains up to `ERROR_BODY_LIMIT` bytes of the body
    /// into `UpstreamError::Status`.
    pub async fn open_stream(&self, messages: &[ChatMessage]) -> Result<ByteStream, UpstreamError> {
        let body = self.request_body(messages)?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| UpstreamError::Transport("credential is not a valid header value".into()))?;
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));

        let request = HttpRequest {
            url: self.completions_url(),
            headers,
            body,
            timeout_ms: Some(self.config.stream_timeout_ms),
        };

        let response = self.http.send(request).await?;
        if response.status.is_success() {
            return Ok(response.body);
        }

        let body = collect_error_body(response.body).await;
        Err(UpstreamError::Status {
            status: response.status,
            body,
        })
    }
}

async fn collect_error_body(mut body: ByteStream) -> String {
    let mut collected = Vec::new();
    while let Some(Ok(chunk)) = body.next().await {
        collected.extend_from_slice(&chunk);
        if collected.len() >= ERROR_BODY_LIMIT {
            collected.truncate(ERROR_BODY_LIMIT);
            break;
        }
    }
    String::from_utf8_lossy(&collected).into_owned()
}

// ---------------------------------------------------------------------------
// Reqwest HTTP sender
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut req = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body);

        if let Some(timeout_ms) = request.timeout_ms {
            req = req.timeout(std::time::Duration::from_millis(timeout_ms));
        }

        let resp = req.send().await.map_err(map_reqwest_error)?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let stream = resp.bytes_stream().map_err(map_reqwest_error);

        Ok(HttpResponse {
            status,
            headers,
            body: Box::pin(stream),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout(e.to_string())
    } else {
        HttpError::Transport(e.to_string())
    }
}

/// Default client wiring: reqwest transport with the given config.
pub fn build_upstream_client(config: UpstreamConfig) -> UpstreamClient {
    UpstreamClient::new(config, Arc::new(ReqwestHttpSender::new(reqwest::Client::new())))
}
