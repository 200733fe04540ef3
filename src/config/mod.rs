use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Open-data resource holding Pennsylvania's mail ballot applications.
pub const DEFAULT_SOURCE_URL: &str = "https://data.pa.gov/resource/mcba-yywm.csv";
pub const DEFAULT_PAGE_SIZE: usize = 50_000;

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub source: SourceConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let base_url =
            env::var("BALLOT_SOURCE_URL").unwrap_or_else(|_| DEFAULT_SOURCE_URL.to_string());
        if base_url.trim().is_empty() {
            return Err(ConfigError::EmptySourceUrl);
        }

        let page_size = match env::var("BALLOT_PAGE_SIZE") {
            Ok(raw) => parse_page_size(&raw)?,
            Err(_) => default_page_size(),
        };

        let timeout = match env::var("BALLOT_HTTP_TIMEOUT_SECS") {
            Ok(raw) => Some(parse_timeout(&raw)?),
            Err(_) => None,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            source: SourceConfig {
                base_url,
                page_size,
                timeout,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Where ballot applications are pulled from and how they are paged.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub page_size: NonZeroUsize,
    /// Per-request timeout; `None` lets a request block until it completes.
    pub timeout: Option<Duration>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_URL.to_string(),
            page_size: default_page_size(),
            timeout: None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn default_page_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN)
}

pub fn parse_page_size(raw: &str) -> Result<NonZeroUsize, ConfigError> {
    raw.trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| ConfigError::InvalidPageSize(raw.to_string()))
}

pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EmptySourceUrl,
    InvalidPageSize(String),
    InvalidTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptySourceUrl => write!(f, "BALLOT_SOURCE_URL must not be empty"),
            ConfigError::InvalidPageSize(value) => write!(
                f,
                "BALLOT_PAGE_SIZE must be a positive integer (got '{value}')"
            ),
            ConfigError::InvalidTimeout(value) => write!(
                f,
                "BALLOT_HTTP_TIMEOUT_SECS must be a positive number of seconds (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("BALLOT_SOURCE_URL");
        env::remove_var("BALLOT_PAGE_SIZE");
        env::remove_var("BALLOT_HTTP_TIMEOUT_SECS");
        env::remove_var("APP_LOG_LEVEL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.source.base_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.source.page_size.get(), 50_000);
        assert!(config.source.timeout.is_none());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn rejects_zero_page_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BALLOT_PAGE_SIZE", "0");
        let error = AppConfig::load().expect_err("zero page size rejected");
        assert!(matches!(error, ConfigError::InvalidPageSize(_)));
        reset_env();
    }

    #[test]
    fn reads_source_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BALLOT_SOURCE_URL", "https://example.org/resource/abcd.csv");
        env::set_var("BALLOT_PAGE_SIZE", "1000");
        env::set_var("BALLOT_HTTP_TIMEOUT_SECS", "30");
        env::set_var("APP_ENV", "ci");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(config.source.base_url, "https://example.org/resource/abcd.csv");
        assert_eq!(config.source.page_size.get(), 1000);
        assert_eq!(config.source.timeout, Some(Duration::from_secs(30)));
        reset_env();
    }

    #[test]
    fn timeout_must_be_positive() {
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("abc").is_err());
        assert_eq!(parse_timeout(" 5 ").ok(), Some(Duration::from_secs(5)));
    }
}
