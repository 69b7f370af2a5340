//! Proxy configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration of the SWR proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Inbound header that names the origin base URL.
    pub origin_header: String,
    /// Query parameter used to bust intermediate caches on origin fetches.
    pub cache_bust_param: String,
    /// Advisory `Cache-Control` sent with origin requests.
    ///
    /// Caching decisions only ever look at the origin's response header.
    pub origin_cache_control: Option<String>,
    /// Re-trigger revalidation for entries stuck in `REVALIDATING` once their
    /// stale-while-revalidate window has elapsed.
    pub retry_stuck_revalidation: bool,
    /// Maximum accepted inbound body size.
    pub max_body_bytes: u64,
    /// Response store settings.
    pub store: StoreConfig,
    /// Origin allowlist.
    pub allowlist: AllowlistConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            origin_header: "x-swr-origin".to_string(),
            cache_bust_param: "_swr".to_string(),
            origin_cache_control: Some("no-cache".to_string()),
            retry_stuck_revalidation: false,
            max_body_bytes: 1024 * 1024,
            store: StoreConfig::default(),
            allowlist: AllowlistConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Render the config as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if http::HeaderName::from_bytes(self.origin_header.as_bytes()).is_err() {
            return Err(ConfigError::Invalid(format!(
                "origin_header is not a valid header name: {:?}",
                self.origin_header
            )));
        }
        if self.cache_bust_param.is_empty() {
            return Err(ConfigError::Invalid("cache_bust_param cannot be empty".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes cannot be 0".into()));
        }
        if self.store.max_entries == 0 {
            return Err(ConfigError::Invalid("store.max_entries cannot be 0".into()));
        }
        if let Some(value) = &self.origin_cache_control {
            if http::HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "origin_cache_control is not a valid header value: {:?}",
                    value
                )));
            }
        }
        Ok(())
    }
}

/// Response store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key-value store label (Spin).
    pub name: String,
    /// Capacity of the in-memory store.
    pub max_entries: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_entries: 10_000,
        }
    }
}

/// Origin allowlist rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowlistConfig {
    /// Exact hosts that may be proxied.
    pub hosts: Vec<String>,
    /// Host patterns, `*` matches any run of characters.
    pub patterns: Vec<String>,
    /// Accepted URL schemes.
    pub schemes: Vec<String>,
    /// Whether hosts matching no rule are accepted.
    pub default_allow: bool,
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            patterns: Vec::new(),
            schemes: vec!["http".to_string(), "https".to_string()],
            default_allow: true,
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for production/log aggregation).
    #[default]
    Json,
    /// Human-readable format (for development).
    Human,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level, overridden by `RUST_LOG`.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}
