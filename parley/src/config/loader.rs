// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

use super::defaults::*;
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a parley config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Parse into raw deserialization types
/// 3. Validate version and numeric ranges
/// 4. Resolve `${VAR}` interpolation in string fields
/// 5. Resolve the credential (config, then `GROQ_API_KEY`); absence is fatal
/// 6. Build typed Config with defaults filled in
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.parley != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.parley
        )));
    }

    let upstream = build_upstream_config(raw.upstream.unwrap_or_default())?;
    let stream = StreamConfig {
        trailing_fragment: raw
            .stream
            .and_then(|s| s.trailing_fragment)
            .unwrap_or_default(),
    };

    Ok(Config {
        version: raw.parley,
        upstream,
        stream,
        environment: raw.environment.unwrap_or_default(),
    })
}

fn build_upstream_config(raw: raw::RawUpstreamConfig) -> Result<UpstreamConfig, ConfigError> {
    let base_url = match raw.base_url {
        Some(url) => resolve_variables(&url)?,
        None => DEFAULT_BASE_URL.to_string(),
    };
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "upstream.base_url \"{base_url}\" must start with http:// or https://"
        )));
    }

    let api_key = resolve_api_key(raw.api_key.as_deref())?;

    let model = match raw.model {
        Some(m) => resolve_variables(&m)?,
        None => DEFAULT_MODEL.to_string(),
    };
    if model.trim().is_empty() {
        return Err(ConfigError::Validation("upstream.model must not be empty".into()));
    }

    let temperature = raw.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(format!(
            "upstream.temperature {temperature} out of range [0, 2]"
        )));
    }

    let top_p = raw.top_p.unwrap_or(DEFAULT_TOP_P);
    if !(0.0..=1.0).contains(&top_p) {
        return Err(ConfigError::Validation(format!(
            "upstream.top_p {top_p} out of range [0, 1]"
        )));
    }

    let max_completion_tokens = raw
        .max_completion_tokens
        .unwrap_or(DEFAULT_MAX_COMPLETION_TOKENS);
    if max_completion_tokens == 0 {
        return Err(ConfigError::Validation(
            "upstream.max_completion_tokens must be positive".into(),
        ));
    }

    let stream_timeout_ms = raw.stream_timeout_ms.unwrap_or(DEFAULT_STREAM_TIMEOUT_MS);
    if stream_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "upstream.stream_timeout_ms must be positive".into(),
        ));
    }

    let reasoning_effort = match raw.reasoning_effort {
        None => Some(DEFAULT_REASONING_EFFORT.to_string()),
        Some(explicit) => explicit,
    };

    Ok(UpstreamConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
        model,
        temperature,
        max_completion_tokens,
        top_p,
        reasoning_effort,
        stream_timeout_ms,
    })
}

fn resolve_api_key(configured: Option<&str>) -> Result<String, ConfigError> {
    let key = match configured {
        Some(value) => match resolve_variables(value) {
            Ok(key) => key,
            // `${GROQ_API_KEY}` unset is the same failure as no key at all.
            Err(ConfigError::UndefinedVariable { .. }) => String::new(),
            Err(e) => return Err(e),
        },
        None => std::env::var(API_KEY_ENV).unwrap_or_default(),
    };

    if key.trim().is_empty() {
        return Err(ConfigError::MissingCredential {
            env_var: API_KEY_ENV,
        });
    }
    Ok(key)
}
