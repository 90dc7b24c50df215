use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::error::ConfigError;

pub const DEFAULT_BUCKET: &str = "chat-images";
pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 5 * 60;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const URL_PLACEHOLDER: &str = "YOUR_SUPABASE_URL";
const KEY_PLACEHOLDER: &str = "YOUR_SUPABASE_ANON_KEY";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let url = env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        let anon_key = env::var("SUPABASE_ANON_KEY").map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        let mut cfg = Self::new(url, anon_key);
        if let Ok(bucket) = env::var("STORAGE_BUCKET") {
            if !bucket.trim().is_empty() {
                cfg.bucket = bucket;
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Missing("SUPABASE_URL"));
        }
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("SUPABASE_ANON_KEY"));
        }
        if self.url == URL_PLACEHOLDER {
            return Err(ConfigError::Placeholder("SUPABASE_URL"));
        }
        if self.anon_key == KEY_PLACEHOLDER {
            return Err(ConfigError::Placeholder("SUPABASE_ANON_KEY"));
        }
        let parsed = url::Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        Ok(())
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Settings that only affect the local client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub idle_threshold: Duration,
    pub gemini_model: String,
    pub openai_model: String,
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            idle_threshold: Duration::from_secs(DEFAULT_IDLE_THRESHOLD_SECS),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            idle_threshold: env::var("IDLE_THRESHOLD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_threshold),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            data_dir: env::var("QUICKCHAT_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_rejected() {
        let cfg = BackendConfig::new(URL_PLACEHOLDER, "key");
        assert_eq!(cfg.validate(), Err(ConfigError::Placeholder("SUPABASE_URL")));
        let cfg = BackendConfig::new("https://abc.supabase.co", KEY_PLACEHOLDER);
        assert_eq!(cfg.validate(), Err(ConfigError::Placeholder("SUPABASE_ANON_KEY")));
    }

    #[test]
    fn empty_and_malformed_values() {
        assert_eq!(
            BackendConfig::new("", "k").validate(),
            Err(ConfigError::Missing("SUPABASE_URL"))
        );
        assert!(matches!(
            BackendConfig::new("not a url", "k").validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            BackendConfig::new("ftp://host", "k").validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn valid_config_trims_trailing_slash() {
        let cfg = BackendConfig::new("https://abc.supabase.co/", "anon");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.base_url(), "https://abc.supabase.co");
        assert_eq!(cfg.bucket, DEFAULT_BUCKET);
    }
}
