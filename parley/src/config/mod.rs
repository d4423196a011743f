// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads parley.yaml, resolves `${VAR}` interpolation, applies defaults,
// and fails fast when the upstream credential is missing.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::API_KEY_ENV;
pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::load_config;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{Config, StreamConfig, UpstreamConfig};
