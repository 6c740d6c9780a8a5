//! Application configuration loaded from the environment
//!
//! `main` calls `dotenv::dotenv()` first, so a `.env` file in the working
//! directory is honored. Command-line flags override what is loaded here.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use yakki_core::{ModelParams, ReferenceConfig, ResultCacheConfig, WatchConfig, WatchMode};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub rule_dir: PathBuf,
    pub cache_max_size: usize,
    pub cache_ttl: Duration,
    pub watch: WatchConfig,
    pub claude_path: PathBuf,
    pub model: ModelParams,
    pub timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cache = ResultCacheConfig::default();
        Self {
            data_dir: PathBuf::from("data"),
            rule_dir: PathBuf::from("rule"),
            cache_max_size: cache.max_entries,
            cache_ttl: cache.default_ttl,
            watch: WatchConfig::default(),
            claude_path: PathBuf::from("claude"),
            model: ModelParams::default(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl AppConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve variables. Unset or blank variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("YAKKI_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("YAKKI_RULE_DIR") {
            config.rule_dir = PathBuf::from(dir);
        }
        if let Some(value) = get("YAKKI_CACHE_MAX_SIZE") {
            config.cache_max_size = parse_var("YAKKI_CACHE_MAX_SIZE", &value)?;
        }
        if let Some(value) = get("YAKKI_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(parse_var("YAKKI_CACHE_TTL_SECS", &value)?);
        }
        if let Some(value) = get("YAKKI_WATCH_MODE") {
            config.watch.mode =
                value
                    .parse::<WatchMode>()
                    .map_err(|e| ConfigError::InvalidVar {
                        var: "YAKKI_WATCH_MODE",
                        value: value.clone(),
                        reason: e.to_string(),
                    })?;
        }
        if let Some(value) = get("YAKKI_POLL_INTERVAL_SECS") {
            config.watch.poll_interval =
                Duration::from_secs(parse_var("YAKKI_POLL_INTERVAL_SECS", &value)?);
        }
        if let Some(value) = get("YAKKI_DEBOUNCE_MS") {
            config.watch.debounce = Duration::from_millis(parse_var("YAKKI_DEBOUNCE_MS", &value)?);
        }
        if let Some(path) = get("YAKKI_CLAUDE_PATH") {
            config.claude_path = PathBuf::from(path);
        }
        if let Some(model) = get("YAKKI_MODEL") {
            config.model.model = model.trim().to_string();
        }
        if let Some(model) = get("YAKKI_FALLBACK_MODEL") {
            config.model.fallback_model = Some(model.trim().to_string());
        }
        if let Some(value) = get("YAKKI_MAX_TOKENS") {
            config.model.max_tokens = parse_var("YAKKI_MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("YAKKI_TEMPERATURE") {
            config.model.temperature = parse_var("YAKKI_TEMPERATURE", &value)?;
        }
        if let Some(value) = get("YAKKI_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_var("YAKKI_TIMEOUT_SECS", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.result_cache()
            .validate()
            .map_err(ConfigError::Invalid)?;

        if self.watch.mode == WatchMode::Poll && self.watch.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll_interval must be greater than 0 in poll mode".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than 0".to_string()));
        }
        if self.model.model.is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.model.temperature
            )));
        }
        Ok(())
    }

    pub fn reference(&self) -> ReferenceConfig {
        ReferenceConfig::new(&self.data_dir, &self.rule_dir)
    }

    pub fn result_cache(&self) -> ResultCacheConfig {
        ResultCacheConfig::builder()
            .max_entries(self.cache_max_size)
            .default_ttl(self.cache_ttl)
            .build()
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidVar {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
