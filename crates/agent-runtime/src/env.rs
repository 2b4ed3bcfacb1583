//! Environment lookups with logged fallbacks

use std::fmt::Display;
use std::str::FromStr;

/// String value of `key`, or `default` when unset or blank
pub fn var_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Optional string value of `key`; blank counts as unset
pub fn var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parsed value of `key`, falling back to `default` on absence or parse failure
pub fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var_opt(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, default = %default, "Invalid value, using default");
                default
            }
        },
    }
}
