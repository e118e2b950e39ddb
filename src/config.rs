//! Configuration loader for the `babywatch-dashboard` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads `env::var` for
//! settings.
//!
use std::env;

use anyhow::{anyhow, Result};
use chrono::FixedOffset;

use crate::timeseries::TimeWindow;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Realtime database base URL, e.g. `https://<project>.firebaseio.com`.
    pub database_url: String,

    /// Web API key for the identity toolkit.
    pub api_key: String,

    /// Identity toolkit base URL.
    pub auth_url: String,

    /// Database path holding the telemetry collection.
    pub sensor_path: String,

    /// Seconds between telemetry polls.
    pub poll_interval_secs: u32,

    /// Timeout for every outbound HTTP request.
    pub http_timeout_secs: u32,

    /// Chart window selected at startup.
    pub default_window: TimeWindow,

    /// Offset applied to chart labels.
    pub display_offset: FixedOffset,

    pub server_port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `FIREBASE_DATABASE_URL` – realtime database base URL
/// - `FIREBASE_API_KEY` – identity toolkit web API key
///
/// Optional:
/// - `FIREBASE_AUTH_URL` – identity toolkit base URL (default: Google's)
/// - `SENSOR_PATH` – telemetry path (default: `sensorData`)
/// - `POLL_INTERVAL_SECS` – poll period (default: 5)
/// - `HTTP_TIMEOUT_SECS` – outbound request timeout (default: 10)
/// - `DEFAULT_WINDOW` – initial chart window (default: `24h`)
/// - `DISPLAY_UTC_OFFSET_MINUTES` – chart label offset (default: 0)
/// - `SERVER_PORT` – listen port (default: 8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let database_url = require_env!("FIREBASE_DATABASE_URL");
    let api_key = require_env!("FIREBASE_API_KEY");
    let auth_url = env::var("FIREBASE_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string());
    let sensor_path = env::var("SENSOR_PATH").unwrap_or_else(|_| "sensorData".to_string());
    let poll_interval_secs = parse_env!("POLL_INTERVAL_SECS", u32, 5);
    let http_timeout_secs = parse_env!("HTTP_TIMEOUT_SECS", u32, 10);
    let default_window = parse_env!("DEFAULT_WINDOW", TimeWindow, TimeWindow::Hours(24));
    let offset_minutes = parse_env!("DISPLAY_UTC_OFFSET_MINUTES", i32, 0);
    let server_port = parse_env!("SERVER_PORT", u16, 8080);

    if poll_interval_secs == 0 {
        return Err(anyhow!("Invalid POLL_INTERVAL_SECS: must be at least 1"));
    }
    let display_offset = display_offset(offset_minutes)?;

    Ok(Config {
        database_url,
        api_key,
        auth_url,
        sensor_path,
        poll_interval_secs,
        http_timeout_secs,
        default_window,
        display_offset,
        server_port,
    })
}

fn display_offset(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| anyhow!("Invalid DISPLAY_UTC_OFFSET_MINUTES: {} is out of range", minutes))
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the API key while showing all other configuration values that
    /// were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  FIREBASE_DATABASE_URL      : {}", self.database_url);
        tracing::info!("  FIREBASE_API_KEY           : {}", mask(&self.api_key));
        tracing::info!("  FIREBASE_AUTH_URL          : {}", self.auth_url);
        tracing::info!("  SENSOR_PATH                : {}", self.sensor_path);
        tracing::info!("  POLL_INTERVAL_SECS         : {}", self.poll_interval_secs);
        tracing::info!("  HTTP_TIMEOUT_SECS          : {}", self.http_timeout_secs);
        tracing::info!("  DEFAULT_WINDOW             : {}", self.default_window);
        tracing::info!("  DISPLAY_UTC_OFFSET_MINUTES : {}", self.display_offset.local_minus_utc() / 60);
        tracing::info!("  SERVER_PORT                : {}", self.server_port);
    }
}

/// Keep the first four characters of a secret.
fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}
