//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for the hosted checkout.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// In-memory storage is used when unset.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub research_model: String,
    pub query_timeout: Duration,
    pub cors_origin: String,
    pub session_ttl_days: i64,
    /// Payments are disabled when unset.
    pub payments: Option<PaymentConfig>,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

/// Sessions may live from one day up to a year.
const SESSION_TTL_RANGE: std::ops::RangeInclusive<i64> = 1..=365;

fn check_session_ttl(days: i64) -> Result<i64, ConfigError> {
    if SESSION_TTL_RANGE.contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError::InvalidValue(
            "SESSION_TTL_DAYS".to_string(),
            format!(
                "{} is outside {}..={}",
                days,
                SESSION_TTL_RANGE.start(),
                SESSION_TTL_RANGE.end()
            ),
        ))
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address: SocketAddr = parse_var("BIND_ADDRESS", "0.0.0.0:5000")?;
        let database_url = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let session_ttl_days = check_session_ttl(parse_var("SESSION_TTL_DAYS", "30")?)?;

        // --- Load Research Backend Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let research_model =
            std::env::var("RESEARCH_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let query_timeout = Duration::from_secs(parse_var("QUERY_TIMEOUT_SECS", "120")?);

        // --- Load Payment Settings (both or neither) ---
        let payments = match (
            std::env::var("RAZORPAY_KEY_ID").ok(),
            std::env::var("RAZORPAY_KEY_SECRET").ok(),
        ) {
            (Some(key_id), Some(key_secret)) => Some(PaymentConfig {
                key_id,
                key_secret,
                api_base: std::env::var("RAZORPAY_API_BASE")
                    .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingVar("RAZORPAY_KEY_SECRET".to_string()))
            }
            (None, Some(_)) => return Err(ConfigError::MissingVar("RAZORPAY_KEY_ID".to_string())),
            (None, None) => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            research_model,
            query_timeout,
            cors_origin,
            session_ttl_days,
            payments,
        })
    }
}
