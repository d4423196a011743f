// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Resolves `${VAR}` and `${VAR:-fallback}` references from the environment.
///
/// An unset variable without a fallback is `ConfigError::UndefinedVariable`.
/// An unterminated `${` is kept literally.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next(); // consume '{'

        let mut expr = String::new();
        let mut found_close = false;
        for c in chars.by_ref() {
            if c == '}' {
                found_close = true;
                break;
            }
            expr.push(c);
        }
        if !found_close || expr.is_empty() {
            result.push_str("${");
            result.push_str(&expr);
            continue;
        }

        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr.as_str(), None),
        };
        match (std::env::var(name), fallback) {
            (Ok(value), _) if !value.is_empty() => result.push_str(&value),
            (_, Some(fallback)) => result.push_str(fallback),
            (Ok(value), None) => result.push_str(&value),
            (Err(_), None) => {
                return Err(ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })
            }
        }
    }

    Ok(result)
}
