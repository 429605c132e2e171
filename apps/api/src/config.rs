use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::local::DevicePreference;
use crate::llm_client::{BackendKind, HttpSettings};

pub const DEFAULT_MODEL_NAME: &str = "roast_master";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PORT: u16 = 7860;

/// Everything needed to build a model backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub http: HttpSettings,
    /// Only read by the generate backend.
    pub force_json: bool,
    pub local_model_path: Option<PathBuf>,
    pub local_device: DevicePreference,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            backend: BackendConfig::from_env()?,
            port: parse_env("PORT", DEFAULT_PORT)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        let kind = optional_env("LLM_BACKEND")
            .map(|v| v.parse::<BackendKind>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("LLM_BACKEND is invalid")?
            .unwrap_or(BackendKind::Chat);

        let local_device = optional_env("LOCAL_DEVICE")
            .map(|v| v.parse::<DevicePreference>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("LOCAL_DEVICE is invalid")?
            .unwrap_or(DevicePreference::Auto);

        Ok(BackendConfig {
            kind,
            http: HttpSettings {
                base_url: optional_env("LLM_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: optional_env("MODEL_NAME")
                    .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
                api_key: optional_env("LLM_API_KEY"),
                timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            },
            force_json: parse_env("LLM_FORCE_JSON", true)?,
            local_model_path: optional_env("LOCAL_MODEL_PATH").map(PathBuf::from),
            local_device,
        })
    }
}

/// Unset and empty are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} must be valid ({e}), got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment is process-global; each test uses its own variable names.

    #[test]
    fn test_parse_env_default_when_unset() {
        std::env::remove_var("ROAST_TEST_UNSET_PORT");
        assert_eq!(parse_env("ROAST_TEST_UNSET_PORT", 7860u16).unwrap(), 7860);
    }

    #[test]
    fn test_parse_env_reads_value() {
        std::env::set_var("ROAST_TEST_PORT", " 8080 ");
        assert_eq!(parse_env("ROAST_TEST_PORT", 7860u16).unwrap(), 8080);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("ROAST_TEST_BAD_PORT", "eighty");
        let err = parse_env("ROAST_TEST_BAD_PORT", 7860u16).unwrap_err();
        assert!(err.to_string().contains("ROAST_TEST_BAD_PORT"));
    }

    #[test]
    fn test_empty_is_unset() {
        std::env::set_var("ROAST_TEST_EMPTY", "   ");
        assert_eq!(optional_env("ROAST_TEST_EMPTY"), None);
    }
}
