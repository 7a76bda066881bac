//! Environment variable parsing utilities.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Get environment variable with default value.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get optional environment variable (None if empty or missing).
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Get a required environment variable.
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env_opt(key).ok_or_else(|| ConfigError::Missing { key: key.into() })
}

/// Parse environment variable as boolean.
/// Treats "1", "true", "yes" (case-insensitive) as true.
pub fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Parse environment variable with type conversion.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse duration string (e.g., "250ms", "30s", "2m", "1h").
/// Returns None for "off" or "0".
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_lowercase();

    if s == "off" || s == "0" || s.is_empty() {
        return Ok(None);
    }

    let number = |n: &str| {
        n.parse::<u64>()
            .map_err(|_| format!("invalid number: {}", n))
    };

    // "ms" must be checked before "s" and "m"
    let duration = if let Some(n) = s.strip_suffix("ms") {
        Duration::from_millis(number(n)?)
    } else if let Some(n) = s.strip_suffix('s') {
        Duration::from_secs(number(n)?)
    } else if let Some(n) = s.strip_suffix('m') {
        Duration::from_secs(number(n)? * 60)
    } else if let Some(n) = s.strip_suffix('h') {
        Duration::from_secs(number(n)? * 3600)
    } else {
        // Plain seconds
        return s
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| format!("invalid duration: {}", s));
    };

    Ok(Some(duration))
}

/// Parse environment variable as an optional duration ("off" disables it).
pub fn env_duration(key: &str, default: &str) -> Result<Option<Duration>, ConfigError> {
    let value = env_or(key, default);
    parse_duration(&value).map_err(|e| ConfigError::Parse {
        key: key.into(),
        value,
        error: e,
    })
}

/// Parse environment variable as a duration that cannot be turned off.
pub fn env_duration_required(key: &str, default: &str) -> Result<Duration, ConfigError> {
    env_duration(key, default)?.ok_or_else(|| ConfigError::Invalid {
        key: key.into(),
        message: "must be a positive duration".into(),
    })
}
