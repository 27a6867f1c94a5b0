//! Decides whether the display runs against local fallback data instead of
//! the live hub runtime, and loads that fallback data.

use std::path::Path;

use serde_json::Value;

use crate::error::FallbackError;
use crate::settings::Settings;

pub const DEV_MODE_ENV: &str = "GRIDAPP_DEV_MODE";

/// Parses a boolean-valued flag. Unrecognized values yield `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn is_dev_mode() -> bool {
    is_dev_mode_with(|key| std::env::var(key).ok())
}

pub fn is_dev_mode_with<F>(get_env: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    get_env(DEV_MODE_ENV)
        .as_deref()
        .and_then(parse_flag)
        .unwrap_or(false)
}

/// Reads the fallback settings document at `path`.
///
/// The document is either the full app document
/// (`{"app": {"gridApp": {"settings": {...}}}}`) or a bare settings object.
pub fn load_fallback_settings(path: &Path) -> Result<Settings, FallbackError> {
    let contents = std::fs::read_to_string(path).map_err(|source| FallbackError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: Value = serde_json::from_str(&contents).map_err(|source| FallbackError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let settings = match document.pointer("/app/gridApp/settings") {
        Some(nested) => nested.clone(),
        None if document.get("productName").is_some() => document,
        None => {
            return Err(FallbackError::MissingSettings {
                path: path.to_path_buf(),
            });
        }
    };

    serde_json::from_value(settings).map_err(|source| FallbackError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Fallback settings for dev mode. Never fails: any load error is logged and
/// the built-in settings are returned instead.
pub fn fallback_settings(path: &Path) -> Settings {
    match load_fallback_settings(path) {
        Ok(settings) => {
            tracing::debug!(
                target: "gridapp::dev_mode",
                path = %path.display(),
                "Loaded fallback settings"
            );
            settings
        }
        Err(e) => {
            tracing::warn!(
                target: "gridapp::dev_mode",
                error = %e,
                "Using built-in fallback settings"
            );
            Settings::builtin_fallback()
        }
    }
}
