//! Process configuration from environment variables.
//!
//! Every variable is optional. An unset or empty variable takes its default;
//! a variable that is set but does not parse is an error rather than being
//! silently replaced.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::transit::{BusConfig, HttpConfig};

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to something that is not a valid value
    #[error("invalid value {value:?} for {name}: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TCP port to listen on (`PORT`, default 3000)
    pub port: u16,
    /// Deployment environment name (`ENV`, default `development`)
    pub env: String,
    /// Bus Time API key (`MTA_BUS_API_KEY`); empty disables bus arrivals
    pub bus_api_key: String,
    /// Upstream cache TTL (`CACHE_TTL_SECONDS`, default 120)
    pub cache_ttl: Duration,
    /// Upstream request timeout (`HTTP_TIMEOUT_SECONDS`, default 10)
    pub http_timeout: Duration,
    /// Directory holding `stops.txt` and `nyc-zipcodes.json` (`DATA_DIR`, default `data`)
    pub data_dir: PathBuf,
    /// Whole-request timeout for incoming requests (`REQUEST_TIMEOUT_SECONDS`, default 15)
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            env: "development".to_string(),
            bus_api_key: String::new(),
            cache_ttl: Duration::from_secs(120),
            http_timeout: Duration::from_secs(10),
            data_dir: PathBuf::from("data"),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            port: match var("PORT") {
                Some(v) => parse(&v, "PORT", "a port number")?,
                None => defaults.port,
            },
            env: var("ENV").unwrap_or(defaults.env),
            bus_api_key: var("MTA_BUS_API_KEY").unwrap_or_default(),
            cache_ttl: seconds(var("CACHE_TTL_SECONDS"), "CACHE_TTL_SECONDS", defaults.cache_ttl)?,
            http_timeout: seconds(
                var("HTTP_TIMEOUT_SECONDS"),
                "HTTP_TIMEOUT_SECONDS",
                defaults.http_timeout,
            )?,
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            request_timeout: seconds(
                var("REQUEST_TIMEOUT_SECONDS"),
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout,
            )?,
        })
    }

    /// Whether running in the development environment.
    pub fn is_development(&self) -> bool {
        self.env == "development"
    }

    /// Cache settings for the aggregators.
    pub fn cache(&self) -> CacheConfig {
        CacheConfig::new(self.cache_ttl)
    }

    /// HTTP client settings for upstream requests.
    pub fn http(&self) -> HttpConfig {
        HttpConfig::new(self.http_timeout)
    }

    /// Bus aggregator settings.
    pub fn bus(&self) -> BusConfig {
        BusConfig::new(self.bus_api_key.clone())
    }
}

fn parse<T: std::str::FromStr>(
    value: &str,
    name: &'static str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
        expected,
    })
}

fn seconds(value: Option<String>, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(v) => parse(&v, name, "a whole number of seconds").map(Duration::from_secs),
        None => Ok(default),
    }
}
