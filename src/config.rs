use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

use crate::web::middleware::rate_limit::RateLimitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env` via dotenvy in `main`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Offset applied to `scanned_at` in exports when the caller passes none.
    pub report_utc_offset_minutes: i32,
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://checkin.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout: Duration::from_secs(30),
            // Nepal time, +05:45
            report_utc_offset_minutes: 345,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let rate_defaults = &defaults.rate_limit;

        let report_utc_offset_minutes =
            parse_var("REPORT_UTC_OFFSET_MINUTES", defaults.report_utc_offset_minutes)?;
        if utc_offset(report_utc_offset_minutes).is_none() {
            return Err(ConfigError::Invalid {
                key: "REPORT_UTC_OFFSET_MINUTES",
                value: report_utc_offset_minutes.to_string(),
            });
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            request_timeout: Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            report_utc_offset_minutes,
            rate_limit: RateLimitConfig {
                max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", rate_defaults.max_requests)?,
                window: Duration::from_secs(parse_var(
                    "RATE_LIMIT_WINDOW_SECS",
                    rate_defaults.window.as_secs(),
                )?),
                idle_timeout: Duration::from_secs(parse_var(
                    "RATE_LIMIT_IDLE_SECS",
                    rate_defaults.idle_timeout.as_secs(),
                )?),
                sweep_interval: Duration::from_secs(parse_var(
                    "RATE_LIMIT_SWEEP_SECS",
                    rate_defaults.sweep_interval.as_secs(),
                )?),
                max_tracked_clients: parse_var(
                    "RATE_LIMIT_MAX_CLIENTS",
                    rate_defaults.max_tracked_clients,
                )?,
            },
        })
    }

    pub fn report_offset(&self) -> FixedOffset {
        utc_offset(self.report_utc_offset_minutes).unwrap_or_else(|| Utc.fix())
    }
}

/// Converts minutes east of UTC into a chrono offset; `None` when out of range.
pub fn utc_offset(minutes: i32) -> Option<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}
