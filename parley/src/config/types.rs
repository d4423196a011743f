// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::stream::TrailingFragmentPolicy;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Parsed and validated parley config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Config schema version. Always "v1".
    pub version: String,
    /// Completion API connection and sampling parameters.
    pub upstream: UpstreamConfig,
    /// Streaming pipeline behavior.
    pub stream: StreamConfig,
    /// Environment label (e.g. "dev", "production"). Logged at startup.
    pub environment: String,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Everything needed to talk to the completion API.
///
/// `Debug` redacts the credential.
#[derive(Clone, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Bearer credential. Never empty once loaded.
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
    /// Omitted from the request body when `None`.
    pub reasoning_effort: Option<String>,
    /// Bound on the total duration of one completion call, stream included.
    pub stream_timeout_ms: u64,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("top_p", &self.top_p)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("stream_timeout_ms", &self.stream_timeout_ms)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamConfig {
    /// Whether unterminated text at end of stream is delivered to the client.
    pub trailing_fragment: TrailingFragmentPolicy,
}
