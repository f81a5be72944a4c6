//! Settings for the removal service client. Credentials are provisioning
//! concerns: defaults, then an optional `cutout.toml`, then environment
//! overrides, never a hardcoded key.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.remove.bg/v1.0/removebg";

const SETTINGS_FILE: &str = "cutout.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("removal API key is not configured; set REMOVAL_API_KEY or api_key in {SETTINGS_FILE}")]
    MissingApiKey,

    #[error("invalid removal API url '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        source: url::ParseError,
    },
}

impl Settings {
    /// The endpoint as a parsed URL, after checking that a key is present.
    pub fn validated_api_url(&self) -> Result<Url, ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Url::parse(&self.api_url).map_err(|source| ConfigError::InvalidApiUrl {
            url: self.api_url.clone(),
            source,
        })
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_url") {
                settings.api_url = v.clone();
            }
            if let Some(v) = file_cfg.get("api_key") {
                settings.api_key = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("REMOVAL_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Ok(v) = std::env::var("REMOVAL_API_KEY") {
        settings.api_key = v;
    }
    if let Ok(v) = std::env::var("APP__API_KEY") {
        settings.api_key = v;
    }

    settings
}
