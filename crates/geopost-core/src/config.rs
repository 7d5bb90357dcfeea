use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://location-ingest.example.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const BASE_URL_VAR: &str = "GEOPOST_BASE_URL";
pub const TIMEOUT_VAR: &str = "GEOPOST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct UploaderConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UploaderConfig {
    /// Defaults, with `GEOPOST_BASE_URL` / `GEOPOST_TIMEOUT_SECS` overrides
    /// taken from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            let value = value.trim().to_string();
            match Url::parse(&value) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => config.base_url = value,
                _ => {
                    return Err(ConfigError::InvalidUrl {
                        name: BASE_URL_VAR,
                        value,
                    })
                }
            }
        }

        if let Some(value) = lookup(TIMEOUT_VAR) {
            let secs = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .ok_or(ConfigError::InvalidTimeout {
                    name: TIMEOUT_VAR,
                    value: value.clone(),
                })?;
            config.timeout = Duration::from_secs_f64(secs);
        }

        Ok(config)
    }
}
