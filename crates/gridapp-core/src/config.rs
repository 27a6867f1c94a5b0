use std::path::{Path, PathBuf};

use crate::dev_mode;
use crate::error::ConfigError;
use crate::hub::Topic;
use crate::snapshot::ItemId;

pub const ENV_MODE_ENV: &str = "GRIDAPP_ENV";
pub const SETTINGS_PATH_ENV: &str = "GRIDAPP_SETTINGS_PATH";
pub const PRODUCT_ID_ENV: &str = "GRIDAPP_PRODUCT_ID";

pub const DEFAULT_ENV_MODE: &str = "development";
pub const DEFAULT_SETTINGS_PATH: &str = "settings/index.json";
pub const DEFAULT_PRODUCT_ID: &str = "TEMPORARY-PRODUCT-ID-123";

/// Runtime configuration for a gridapp session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAppConfig {
    /// Use local fallback data instead of the hub runtime.
    pub dev_mode: bool,
    pub fallback_settings_path: PathBuf,
    /// Item used for add-to-cart and the cart count.
    pub product_id: ItemId,
    /// Session-state topics subscribed once the session is ready.
    pub topics: Vec<Topic>,
}

impl Default for GridAppConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            fallback_settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            product_id: ItemId::new(DEFAULT_PRODUCT_ID),
            topics: vec![Topic::cart()],
        }
    }
}

impl GridAppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(dev_mode::is_dev_mode(), |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(dev_mode::is_dev_mode_with(&get_env), get_env)
    }

    fn resolve<F>(dev_mode: bool, get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            dev_mode,
            ..Self::default()
        };

        if let Some(path) = non_empty(get_env(SETTINGS_PATH_ENV)) {
            config.fallback_settings_path = PathBuf::from(path);
        }

        if let Some(raw) = get_env(PRODUCT_ID_ENV) {
            let id = raw.trim();
            if id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: PRODUCT_ID_ENV.to_string(),
                    value: raw,
                });
            }
            config.product_id = ItemId::new(id);
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Environment mode used to pick env files, from `GRIDAPP_ENV`.
pub fn env_mode() -> String {
    non_empty(std::env::var(ENV_MODE_ENV).ok()).unwrap_or_else(|| DEFAULT_ENV_MODE.to_string())
}

/// Env files considered for `mode`, highest precedence first.
pub fn env_file_candidates(dir: &Path, mode: &str) -> Vec<PathBuf> {
    [
        format!(".env.{mode}.local"),
        format!(".env.{mode}"),
        ".env.local".to_string(),
        ".env".to_string(),
    ]
    .into_iter()
    .map(|name| dir.join(name))
    .collect()
}

#[derive(Debug, Default)]
pub struct EnvFiles {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, dotenvy::Error)>,
}

/// Loads env files from `dir` into the process environment.
///
/// Files loaded earlier take precedence and variables already set in the
/// process are never overridden. Missing files are skipped; malformed ones
/// are reported in [`EnvFiles::failed`].
pub fn load_env_files(dir: &Path, mode: &str) -> EnvFiles {
    let mut outcome = EnvFiles::default();

    for path in env_file_candidates(dir, mode) {
        match dotenvy::from_path(&path) {
            Ok(()) => outcome.loaded.push(path),
            Err(e) if e.not_found() => {}
            Err(e) => outcome.failed.push((path, e)),
        }
    }

    outcome
}

impl EnvFiles {
    pub fn log(&self) {
        for path in &self.loaded {
            tracing::debug!(target: "gridapp::config", path = %path.display(), "Loaded env file");
        }
        for (path, error) in &self.failed {
            tracing::warn!(
                target: "gridapp::config",
                path = %path.display(),
                error = %error,
                "Skipping malformed env file"
            );
        }
    }
}
