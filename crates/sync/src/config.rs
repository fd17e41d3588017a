//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BIGCOMMERCE_STORE_HASH` - Store hash from the API path
//! - `BIGCOMMERCE_CLIENT_ID` - API account client ID
//! - `BIGCOMMERCE_ACCESS_TOKEN` - API account access token (high entropy)
//!
//! ## Optional
//! - `BIGCOMMERCE_API_URL` - API host (default: <https://api.bigcommerce.com>)
//! - `BIGCOMMERCE_API_VERSION` - API version (default: v3)
//! - `CATALOG_SYNC_SETTINGS` - Path to a YAML sync settings file
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//! - `LOG_FORMAT` - `text` or `json` (default: text)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use catalog_sync_core::{SettingsError, SyncSettings};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "https://api.bigcommerce.com";
const DEFAULT_API_VERSION: &str = "v3";

/// Issued access tokens are 31 characters; shorter values are truncated pastes.
const MIN_TOKEN_LEN: usize = 20;

/// Issued tokens are random base-36, which sits well above this.
const MIN_TOKEN_BITS_PER_CHAR: f64 = 3.3;

/// Fragments found in `.env` templates and docs, never in an issued token.
const TEMPLATE_MARKERS: &[&str] = &[
    "access_token",
    "access-token",
    "bigcommerce",
    "your_",
    "your-",
    "changeme",
    "dummy",
    "xxxx",
    "<",
    ">",
    "{",
    "}",
    "$",
];

/// Why `BIGCOMMERCE_ACCESS_TOKEN` was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeakToken {
    #[error("contains whitespace; check for a pasted line break")]
    Whitespace,
    #[error("only {0} characters long; copy the whole token from the API account")]
    TooShort(usize),
    #[error("looks like a template value (contains '{0}')")]
    Template(&'static str),
    #[error("too repetitive to be an issued token ({0:.2} bits per character)")]
    Repetitive(f64),
}

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Refusing {var}: {reason}")]
    RejectedToken { var: String, reason: WeakToken },
    #[error("Failed to read settings file {}: {source}", .path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    SettingsParse(#[from] serde_yaml::Error),
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidEnvVar(
                "LOG_FORMAT".to_string(),
                format!("expected 'text' or 'json', got '{other}'"),
            )),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// BigCommerce API configuration
    pub bigcommerce: BigCommerceConfig,
    /// Reconciliation settings
    pub settings: SyncSettings,
    /// Where the settings were loaded from, if not defaults
    pub settings_path: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    pub log_format: LogFormat,
}

/// BigCommerce API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct BigCommerceConfig {
    /// Store hash (the `{hash}` in `/stores/{hash}/v3`)
    pub store_hash: String,
    /// API account client ID
    pub client_id: String,
    /// API account access token
    pub access_token: SecretString,
    /// API host
    pub api_url: Url,
    /// API version path segment
    pub api_version: String,
}

impl std::fmt::Debug for BigCommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigCommerceConfig")
            .field("store_hash", &self.store_hash)
            .field("client_id", &self.client_id)
            .field("access_token", &"[REDACTED]")
            .field("api_url", &self.api_url.as_str())
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// if the access token fails validation, or if the settings file cannot
    /// be read, parsed or validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let bigcommerce = BigCommerceConfig::from_env()?;

        let settings_path = get_optional_env("CATALOG_SYNC_SETTINGS").map(PathBuf::from);
        let settings = match &settings_path {
            Some(path) => load_settings(path)?,
            None => SyncSettings::default(),
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let log_format = get_optional_env("LOG_FORMAT")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            bigcommerce,
            settings,
            settings_path,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            log_format,
        })
    }
}

impl BigCommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_env_or_default("BIGCOMMERCE_API_URL", DEFAULT_API_URL);
        let api_url = Url::parse(&api_url).map_err(|e| {
            ConfigError::InvalidEnvVar("BIGCOMMERCE_API_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            store_hash: get_required_env("BIGCOMMERCE_STORE_HASH")?,
            client_id: get_required_env("BIGCOMMERCE_CLIENT_ID")?,
            access_token: get_access_token("BIGCOMMERCE_ACCESS_TOKEN")?,
            api_url,
            api_version: get_env_or_default("BIGCOMMERCE_API_VERSION", DEFAULT_API_VERSION),
        })
    }
}

/// Parse and validate sync settings from YAML.
///
/// # Errors
///
/// Returns `ConfigError::SettingsParse` for malformed YAML and
/// `ConfigError::InvalidSettings` if the settings contradict each other.
pub fn parse_settings(yaml: &str) -> Result<SyncSettings, ConfigError> {
    let settings: SyncSettings = serde_yaml::from_str(yaml)?;
    settings.validate()?;
    Ok(settings)
}

/// Read, parse and validate a YAML settings file.
///
/// # Errors
///
/// Returns `ConfigError::SettingsRead` if the file cannot be read, otherwise
/// the errors of [`parse_settings`].
pub fn load_settings(path: &Path) -> Result<SyncSettings, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&yaml)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar(key.to_string()));
    }
    Ok(value)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Shannon entropy of the token's characters.
#[allow(clippy::cast_precision_loss)]
fn bits_per_char(token: &str) -> f64 {
    let mut chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return 0.0;
    }
    chars.sort_unstable();

    let total = chars.len() as f64;
    chars
        .chunk_by(|a, b| a == b)
        .map(|run| {
            let p = run.len() as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject values that cannot be a token issued for an API account.
fn check_access_token(token: &str) -> Result<(), WeakToken> {
    if token.chars().any(char::is_whitespace) {
        return Err(WeakToken::Whitespace);
    }
    let len = token.chars().count();
    if len < MIN_TOKEN_LEN {
        return Err(WeakToken::TooShort(len));
    }

    let lower = token.to_ascii_lowercase();
    if let Some(marker) = TEMPLATE_MARKERS.iter().find(|m| lower.contains(*m)) {
        return Err(WeakToken::Template(*marker));
    }

    let bits = bits_per_char(token);
    if bits < MIN_TOKEN_BITS_PER_CHAR {
        return Err(WeakToken::Repetitive(bits));
    }
    Ok(())
}

fn get_access_token(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    check_access_token(&value).map_err(|reason| ConfigError::RejectedToken {
        var: key.to_string(),
        reason,
    })?;
    Ok(SecretString::from(value))
}
