//! Configuration types for the sheet synchronization engine.
//!
//! Root configuration struct and nested section types with full defaults,
//! validation, YAML file loading, and environment variable overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("environment override {name}: {message}")]
    Env { name: String, message: String },
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub sheet: SheetConfig,
    pub transport: TransportConfig,
    pub cache: CacheConfig,
    pub bounds: BoundsConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the entire configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Sheet
        if self.sheet.sheet_name.trim().is_empty() {
            return Err(invalid("sheet.sheet_name is required"));
        }
        if self.sheet.data_range.trim().is_empty() {
            return Err(invalid("sheet.data_range is required"));
        }

        // Transport
        let base = self.transport.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid("transport.base_url must be an http(s) URL"));
        }
        if self.transport.request_timeout_ms == 0 {
            return Err(invalid("transport.request_timeout_ms must be greater than 0"));
        }
        if self.transport.connect_timeout_ms == 0 {
            return Err(invalid("transport.connect_timeout_ms must be greater than 0"));
        }

        // Cache
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs must be greater than 0"));
        }

        // Bounds
        if !(self.bounds.max_x.is_finite() && self.bounds.max_x > 0.0) {
            return Err(invalid("bounds.max_x must be a positive number"));
        }
        if !(self.bounds.max_y.is_finite() && self.bounds.max_y > 0.0) {
            return Err(invalid("bounds.max_y must be a positive number"));
        }

        // Retry
        if self.retry.max_attempts < 1 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(invalid(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms",
            ));
        }

        // Logging
        match self.logging.level.to_lowercase().trim() {
            "debug" | "info" | "warn" | "error" => {}
            _ => return Err(invalid("logging.level must be one of debug, info, warn, error")),
        }
        match self.logging.format.to_lowercase().trim() {
            "console" | "json" => {}
            _ => return Err(invalid("logging.format must be one of console, json")),
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Which spreadsheet and tab hold the records.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Column span read on fetch, without the sheet prefix.
    pub data_range: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".into(),
            data_range: "A:Z".into(),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com/v4".into(),
            access_token: None,
            request_timeout_ms: 10_000,
            connect_timeout_ms: 2_000,
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Record cache freshness window.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Spatial bounding rectangle. The lower corner is always the origin.
#[derive(Debug, Clone)]
pub struct BoundsConfig {
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            max_x: 6500.0,
            max_y: 3600.0,
        }
    }
}

/// Retry/backoff settings for push.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub rate_limit_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            rate_limit_backoff_ms: 5_000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "console".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    sheet: PartialSheetConfig,
    #[serde(default)]
    transport: PartialTransportConfig,
    #[serde(default)]
    cache: PartialCacheConfig,
    #[serde(default)]
    bounds: PartialBoundsConfig,
    #[serde(default)]
    retry: PartialRetryConfig,
    #[serde(default)]
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PartialSheetConfig {
    #[serde(default)]
    spreadsheet_id: String,
    #[serde(default)]
    sheet_name: String,
    #[serde(default)]
    data_range: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialTransportConfig {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    request_timeout_ms: u64,
    #[serde(default)]
    connect_timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialCacheConfig {
    #[serde(default)]
    ttl_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialBoundsConfig {
    #[serde(default)]
    max_x: f64,
    #[serde(default)]
    max_y: f64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialRetryConfig {
    #[serde(default)]
    max_attempts: u32,
    #[serde(default)]
    initial_backoff_ms: u64,
    #[serde(default)]
    max_backoff_ms: u64,
    #[serde(default)]
    rate_limit_backoff_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
}

/// Load config with precedence:
/// defaults < config file (explicit => hard error if unreadable) < environment.
///
/// Returns the validated config and the file that was applied, if any.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let mut cfg = Config::default();

    let (path_to_try, required) = match explicit {
        Some(path) => (Some(path.to_path_buf()), true),
        None => (default_config_path(), false),
    };

    let mut used = None;
    if let Some(path) = path_to_try {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                apply_yaml(&mut cfg, &text)?;
                used = Some(path);
            }
            Err(err) => {
                if required {
                    return Err(ConfigError::Read {
                        path: path.display().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    apply_env_overrides(&mut cfg, |name| std::env::var(name).ok())?;
    cfg.validate()?;
    Ok((cfg, used))
}

/// Merge a YAML document over `cfg`. Empty/zero values leave defaults alone.
pub fn apply_yaml(cfg: &mut Config, text: &str) -> Result<(), ConfigError> {
    let partial: PartialConfig =
        serde_yaml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
    apply_partial(cfg, partial);
    Ok(())
}

fn apply_partial(cfg: &mut Config, partial: PartialConfig) {
    set_string(&mut cfg.sheet.spreadsheet_id, &partial.sheet.spreadsheet_id);
    set_string(&mut cfg.sheet.sheet_name, &partial.sheet.sheet_name);
    set_string(&mut cfg.sheet.data_range, &partial.sheet.data_range);

    set_string(&mut cfg.transport.base_url, &partial.transport.base_url);
    if !partial.transport.access_token.trim().is_empty() {
        cfg.transport.access_token = Some(partial.transport.access_token.trim().to_string());
    }
    if partial.transport.request_timeout_ms > 0 {
        cfg.transport.request_timeout_ms = partial.transport.request_timeout_ms;
    }
    if partial.transport.connect_timeout_ms > 0 {
        cfg.transport.connect_timeout_ms = partial.transport.connect_timeout_ms;
    }

    if partial.cache.ttl_secs > 0 {
        cfg.cache.ttl_secs = partial.cache.ttl_secs;
    }

    if partial.bounds.max_x > 0.0 {
        cfg.bounds.max_x = partial.bounds.max_x;
    }
    if partial.bounds.max_y > 0.0 {
        cfg.bounds.max_y = partial.bounds.max_y;
    }

    if partial.retry.max_attempts > 0 {
        cfg.retry.max_attempts = partial.retry.max_attempts;
    }
    if partial.retry.initial_backoff_ms > 0 {
        cfg.retry.initial_backoff_ms = partial.retry.initial_backoff_ms;
    }
    if partial.retry.max_backoff_ms > 0 {
        cfg.retry.max_backoff_ms = partial.retry.max_backoff_ms;
    }
    if partial.retry.rate_limit_backoff_ms > 0 {
        cfg.retry.rate_limit_backoff_ms = partial.retry.rate_limit_backoff_ms;
    }

    set_string(&mut cfg.logging.level, &partial.logging.level);
    set_string(&mut cfg.logging.format, &partial.logging.format);
}

fn set_string(target: &mut String, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *target = value.to_string();
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

pub const ENV_SPREADSHEET_ID: &str = "SHEETSYNC_SPREADSHEET_ID";
pub const ENV_SHEET_NAME: &str = "SHEETSYNC_SHEET_NAME";
pub const ENV_ACCESS_TOKEN: &str = "SHEETSYNC_ACCESS_TOKEN";
pub const ENV_BASE_URL: &str = "SHEETSYNC_BASE_URL";
pub const ENV_CACHE_TTL_SECS: &str = "SHEETSYNC_CACHE_TTL_SECS";
pub const ENV_LOG_LEVEL: &str = "SHEETSYNC_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SHEETSYNC_LOG_FORMAT";

/// Apply `SHEETSYNC_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get(ENV_SPREADSHEET_ID) {
        cfg.sheet.spreadsheet_id = v;
    }
    if let Some(v) = get(ENV_SHEET_NAME) {
        cfg.sheet.sheet_name = v;
    }
    if let Some(v) = get(ENV_ACCESS_TOKEN) {
        cfg.transport.access_token = Some(v);
    }
    if let Some(v) = get(ENV_BASE_URL) {
        cfg.transport.base_url = v;
    }
    if let Some(v) = get(ENV_CACHE_TTL_SECS) {
        cfg.cache.ttl_secs = v.parse::<u64>().map_err(|err| ConfigError::Env {
            name: ENV_CACHE_TTL_SECS.to_string(),
            message: err.to_string(),
        })?;
    }
    if let Some(v) = get(ENV_LOG_LEVEL) {
        cfg.logging.level = v;
    }
    if let Some(v) = get(ENV_LOG_FORMAT) {
        cfg.logging.format = v;
    }
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("sheetsync").join("config.yaml"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(
                PathBuf::from(home)
                    .join(".config")
                    .join("sheetsync")
                    .join("config.yaml"),
            );
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
