// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// Kept apart from the public Config structs so that variable interpolation,
// defaulting and credential checks happen between parse and build.

use serde::Deserialize;

use crate::stream::TrailingFragmentPolicy;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub parley: String,
    pub upstream: Option<RawUpstreamConfig>,
    pub stream: Option<RawStreamConfig>,
    pub environment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawUpstreamConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_completion_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// `Some(None)` (explicit null) disables the field; absent means default.
    #[serde(default, deserialize_with = "explicit_null")]
    pub reasoning_effort: Option<Option<String>>,
    pub stream_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStreamConfig {
    pub trailing_fragment: Option<TrailingFragmentPolicy>,
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
