use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_KEYLESS_BASE: &str = "https://image.pollinations.ai";
pub const DEFAULT_SHOP_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_KEYLESS_TIMEOUT_SECS: u64 = 60;

/// Whether a usable model credential was configured at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    NoCredential,
    CredentialPresent,
}

impl CredentialState {
    pub fn is_present(&self) -> bool {
        matches!(self, CredentialState::CredentialPresent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialState::NoCredential => "no_credential",
            CredentialState::CredentialPresent => "credential_present",
        }
    }
}

/// Where the product catalog comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Mock,
    Networked,
}

impl BackendMode {
    pub fn parse(raw: &str) -> Option<BackendMode> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mock" | "local" => Some(BackendMode::Mock),
            "networked" | "network" | "rest" | "api" => Some(BackendMode::Networked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Mock => "mock",
            BackendMode::Networked => "networked",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: Option<String>,
    pub keyless_base: String,
    pub keyless_timeout: Duration,
    pub request_timeout: Duration,
    pub backend: BackendMode,
    pub catalog_path: Option<PathBuf>,
    pub shop_api_url: String,
    pub events_path: Option<PathBuf>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: None,
            keyless_base: DEFAULT_KEYLESS_BASE.to_string(),
            keyless_timeout: Duration::from_secs(DEFAULT_KEYLESS_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            backend: BackendMode::Mock,
            catalog_path: None,
            shop_api_url: DEFAULT_SHOP_API_URL.to_string(),
            events_path: None,
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_env)
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        config.api_key = get("GIFTBOT_API_KEY")
            .or_else(|| get("GEMINI_API_KEY"))
            .or_else(|| get("GOOGLE_API_KEY"));
        if let Some(base) = get("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        config.text_model = get("GIFTBOT_TEXT_MODEL");
        if let Some(base) = get("GIFTBOT_KEYLESS_BASE") {
            config.keyless_base = base.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("GIFTBOT_KEYLESS_TIMEOUT_SECS") {
            config.keyless_timeout = parse_timeout("GIFTBOT_KEYLESS_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("GIFTBOT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_timeout("GIFTBOT_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("GIFTBOT_BACKEND") {
            let Some(mode) = BackendMode::parse(&raw) else {
                bail!("GIFTBOT_BACKEND must be 'mock' or 'networked', got '{raw}'");
            };
            config.backend = mode;
        }
        config.catalog_path = get("GIFTBOT_CATALOG").map(PathBuf::from);
        if let Some(url) = get("GIFTBOT_API_URL") {
            config.shop_api_url = url.trim_end_matches('/').to_string();
        }
        config.events_path = get("GIFTBOT_EVENTS").map(PathBuf::from);
        Ok(config)
    }

    pub fn credential_state(&self) -> CredentialState {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => CredentialState::CredentialPresent,
            _ => CredentialState::NoCredential,
        }
    }
}

fn parse_timeout(key: &str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BrokerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        BrokerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() -> Result<()> {
        let config = config_from(&[])?;
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.credential_state(), CredentialState::NoCredential);
        Ok(())
    }

    #[test]
    fn api_key_precedence() -> Result<()> {
        let config = config_from(&[("GOOGLE_API_KEY", "g"), ("GEMINI_API_KEY", "m")])?;
        assert_eq!(config.api_key.as_deref(), Some("m"));
        let config = config_from(&[("GIFTBOT_API_KEY", "x"), ("GEMINI_API_KEY", "m")])?;
        assert_eq!(config.api_key.as_deref(), Some("x"));
        assert_eq!(config.credential_state(), CredentialState::CredentialPresent);
        Ok(())
    }

    #[test]
    fn blank_key_is_no_credential() -> Result<()> {
        let config = config_from(&[("GIFTBOT_API_KEY", "   ")])?;
        assert_eq!(config.credential_state(), CredentialState::NoCredential);
        Ok(())
    }

    #[test]
    fn overrides_are_trimmed() -> Result<()> {
        let config = config_from(&[
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/v1beta/"),
            ("GIFTBOT_BACKEND", "Networked"),
            ("GIFTBOT_API_URL", "http://shop.test/api/"),
            ("GIFTBOT_KEYLESS_TIMEOUT_SECS", "5"),
        ])?;
        assert_eq!(config.api_base, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.backend, BackendMode::Networked);
        assert_eq!(config.shop_api_url, "http://shop.test/api");
        assert_eq!(config.keyless_timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("GIFTBOT_BACKEND", "cloud")]).is_err());
        assert!(config_from(&[("GIFTBOT_REQUEST_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("GIFTBOT_REQUEST_TIMEOUT_SECS", "0")]).is_err());
    }
}
