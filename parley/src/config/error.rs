// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

/// All errors that can occur during config loading and validation.
///
/// Every variant is fatal at startup; none are produced per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config source: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("undefined variable ${{{name}}} in config (not set in environment)")]
    UndefinedVariable { name: String },

    #[error("missing upstream credential: set upstream.api_key or the {env_var} environment variable")]
    MissingCredential { env_var: &'static str },
}
