//! Service configuration from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_TIMEOUT_MINUTES: u64 = 10;
const DEFAULT_WARNING_TIMEOUT_MINUTES: u64 = 8;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error(
        "WARNING_TIMEOUT_MINUTES ({warning}) must be less than SESSION_TIMEOUT_MINUTES ({timeout})"
    )]
    WarningNotBeforeTimeout { warning: u64, timeout: u64 },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub channel_access_token: String,
    pub channel_secret: String,
    pub admin_user_id: Option<String>,
    pub db_path: PathBuf,
    pub port: u16,
    pub session_timeout: Duration,
    pub warning_after: Duration,
    pub sweep_interval: Duration,
    pub validate_cancel_phone: bool,
    pub version: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let channel_access_token = get("LINE_CHANNEL_ACCESS_TOKEN")
            .ok_or(ConfigError::Missing("LINE_CHANNEL_ACCESS_TOKEN"))?;
        let channel_secret =
            get("LINE_CHANNEL_SECRET").ok_or(ConfigError::Missing("LINE_CHANNEL_SECRET"))?;

        let db_path = get("TABLEBOT_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home)
                    .join(".tablebot")
                    .join("reservations.db")
            },
            PathBuf::from,
        );

        let port = parse_or(get("TABLEBOT_PORT"), "TABLEBOT_PORT", DEFAULT_PORT)?;
        let timeout_minutes = parse_or(
            get("SESSION_TIMEOUT_MINUTES"),
            "SESSION_TIMEOUT_MINUTES",
            DEFAULT_SESSION_TIMEOUT_MINUTES,
        )?;
        let warning_minutes = parse_or(
            get("WARNING_TIMEOUT_MINUTES"),
            "WARNING_TIMEOUT_MINUTES",
            DEFAULT_WARNING_TIMEOUT_MINUTES,
        )?;
        if warning_minutes >= timeout_minutes {
            return Err(ConfigError::WarningNotBeforeTimeout {
                warning: warning_minutes,
                timeout: timeout_minutes,
            });
        }
        let sweep_seconds = parse_or(
            get("SWEEP_INTERVAL_SECONDS"),
            "SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;
        let validate_cancel_phone = match get("VALIDATE_CANCEL_PHONE") {
            None => false,
            Some(value) => parse_flag(&value).ok_or(ConfigError::Invalid {
                key: "VALIDATE_CANCEL_PHONE",
                value,
            })?,
        };

        Ok(Self {
            channel_access_token,
            channel_secret,
            admin_user_id: get("ADMIN_USER_ID"),
            db_path,
            port,
            session_timeout: Duration::from_secs(timeout_minutes.saturating_mul(60)),
            warning_after: Duration::from_secs(warning_minutes.saturating_mul(60)),
            sweep_interval: Duration::from_secs(sweep_seconds.max(1)),
            validate_cancel_phone,
            version: get("APP_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
