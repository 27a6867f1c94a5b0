use std::path::PathBuf;

use strum::Display;
use thiserror::Error;

/// Errors reported by the hub runtime across its capability boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by hub runtime: {0}")]
    Rejected(String),

    #[error("Hub connection released")]
    Released,

    #[error("Channel closed")]
    ChannelClosed,
}

/// Step of the session lifecycle a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    Connect,
    InitializeSignals,
    FetchSettings,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage} failed: {source}")]
pub struct ConnectError {
    pub stage: Stage,
    #[source]
    pub source: HubError,
}

impl ConnectError {
    pub fn new(stage: Stage, source: HubError) -> Self {
        Self { stage, source }
    }

    /// Adapter for `map_err` at a given stage.
    pub fn at(stage: Stage) -> impl FnOnce(HubError) -> Self {
        move |source| Self::new(stage, source)
    }
}

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("Failed to read fallback settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse fallback settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No settings object in fallback document at {path}")]
    MissingSettings { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
