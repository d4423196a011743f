// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Built-in defaults, matching the Groq OpenAI-compatible endpoint.

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 8192;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_REASONING_EFFORT: &str = "medium";
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 120_000;

/// Environment variable consulted when `upstream.api_key` is absent.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";
