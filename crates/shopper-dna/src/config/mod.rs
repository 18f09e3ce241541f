use crate::workflows::rfm::{AsOf, RfmConfig, RuleTable, RuleTableError, DEFAULT_BUCKETS, MAX_BUCKETS};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
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
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rfm: RfmSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rfm: RfmSettings::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Segmentation defaults and file locations used by the CLI and the service.
#[derive(Debug, Clone)]
pub struct RfmSettings {
    pub buckets: u8,
    pub as_of: AsOf,
    pub rules_path: Option<PathBuf>,
    pub orders_path: PathBuf,
    pub results_path: PathBuf,
    pub summary_path: PathBuf,
}

impl Default for RfmSettings {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
            as_of: AsOf::default(),
            rules_path: None,
            orders_path: PathBuf::from("superstore.csv"),
            results_path: PathBuf::from("rfm_results.csv"),
            summary_path: PathBuf::from("summary.txt"),
        }
    }
}

impl RfmSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let buckets = match non_empty_var("RFM_SCORE_BUCKETS") {
            Some(raw) => parse_buckets(&raw)?,
            None => defaults.buckets,
        };
        let as_of = match non_empty_var("RFM_AS_OF") {
            Some(raw) => raw
                .parse::<AsOf>()
                .map_err(|reason| ConfigError::InvalidAsOf { value: raw, reason })?,
            None => defaults.as_of,
        };

        Ok(Self {
            buckets,
            as_of,
            rules_path: non_empty_var("RFM_RULES_PATH").map(PathBuf::from),
            orders_path: non_empty_var("RFM_ORDERS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.orders_path),
            results_path: non_empty_var("RFM_RESULTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_path),
            summary_path: non_empty_var("RFM_SUMMARY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.summary_path),
        })
    }

    /// Engine settings, loading the custom rule table from disk when one is
    /// configured.
    pub fn engine_config(&self) -> Result<RfmConfig, ConfigError> {
        let rules = match &self.rules_path {
            Some(path) => Some(RuleTable::from_path(path).map_err(|source| ConfigError::Rules {
                path: path.clone(),
                source,
            })?),
            None => None,
        };

        Ok(RfmConfig {
            buckets: self.buckets,
            as_of: self.as_of,
            rules,
        })
    }
}

/// Accepts `2..=MAX_BUCKETS`.
pub fn parse_buckets(raw: &str) -> Result<u8, ConfigError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|buckets| (2..=MAX_BUCKETS).contains(buckets))
        .ok_or_else(|| ConfigError::InvalidBuckets {
            value: raw.to_string(),
        })
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidBuckets {
        value: String,
    },
    InvalidAsOf {
        value: String,
        reason: String,
    },
    Rules {
        path: PathBuf,
        source: RuleTableError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBuckets { value } => write!(
                f,
                "score bucket count must be an integer in 2..={}, got '{}'",
                MAX_BUCKETS, value
            ),
            ConfigError::InvalidAsOf { reason, .. } => write!(f, "RFM_AS_OF: {}", reason),
            ConfigError::Rules { path, .. } => {
                write!(f, "failed to load rule table from {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Rules { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBuckets { .. }
            | ConfigError::InvalidAsOf { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "RFM_SCORE_BUCKETS",
            "RFM_AS_OF",
            "RFM_RULES_PATH",
            "RFM_ORDERS_PATH",
            "RFM_RESULTS_PATH",
            "RFM_SUMMARY_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.rfm.buckets, 5);
        assert_eq!(config.rfm.as_of, AsOf::MaxOrderDate);
        assert_eq!(config.rfm.orders_path, PathBuf::from("superstore.csv"));
        assert_eq!(config.rfm.results_path, PathBuf::from("rfm_results.csv"));
        assert_eq!(config.rfm.summary_path, PathBuf::from("summary.txt"));
        assert!(config.rfm.rules_path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_rfm_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RFM_SCORE_BUCKETS", "4");
        env::set_var("RFM_AS_OF", "2024-01-31");
        env::set_var("RFM_RESULTS_PATH", "out/results.csv");
        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.rfm.buckets, 4);
        assert_eq!(
            config.rfm.as_of,
            AsOf::Fixed(NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"))
        );
        assert_eq!(config.rfm.results_path, PathBuf::from("out/results.csv"));

        let engine = config.rfm.engine_config().expect("no rules file");
        assert_eq!(engine.buckets, 4);
        assert!(engine.rules.is_none());
    }

    #[test]
    fn rejects_invalid_rfm_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RFM_SCORE_BUCKETS", "1");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidBuckets { .. })
        ));

        reset_env();
        env::set_var("RFM_AS_OF", "31/01/2024");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidAsOf { .. })));
        reset_env();
    }

    #[test]
    fn missing_rules_file_is_a_config_error() {
        let settings = RfmSettings {
            rules_path: Some(PathBuf::from("./does-not-exist.json")),
            ..RfmSettings::default()
        };
        match settings.engine_config() {
            Err(ConfigError::Rules {
                source: RuleTableError::Io(_),
                ..
            }) => {}
            other => panic!("expected rules io error, got {other:?}"),
        }
    }

    #[test]
    fn bucket_parsing_enforces_range() {
        assert_eq!(parse_buckets(" 10 ").expect("valid"), 10);
        assert!(parse_buckets("0").is_err());
        assert!(parse_buckets("101").is_err());
        assert!(parse_buckets("five").is_err());
    }
}
