// ABOUTME: Environment-based configuration with fail-fast validation
// ABOUTME: A malformed encryption key or redirect URI refuses startup instead of failing later
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment-based configuration management

use std::env;
use std::str::FromStr;

use chrono::Duration;
use chrono_tz::Tz;

use crate::crypto::EncryptionKey;
use crate::errors::{AppError, AppResult};

const DEFAULT_DATABASE_URL: &str = "sqlite:data/luma.db";
const DEFAULT_REFRESH_BUFFER_SECS: i64 = 60;
const DEFAULT_CALENDAR_MAX_RESULTS: u32 = 5;

/// Google OAuth client settings
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

/// Complete server configuration, read once at startup
#[derive(Debug)]
pub struct ServerConfig {
    /// Key for token encryption at rest
    pub encryption_key: EncryptionKey,
    /// Google OAuth client settings
    pub google: GoogleConfig,
    /// Database connection string
    pub database_url: String,
    /// How far before expiry a token is already treated as stale
    pub refresh_buffer: Duration,
    /// Default upper bound on listed calendar events
    pub calendar_max_results: u32,
    /// Timezone the snapshot time section is rendered in
    pub timezone: Tz,
}

impl ServerConfig {
    /// Read and validate the full configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` for an absent required variable and
    /// `ConfigInvalid` for one that is present but malformed; the process
    /// must refuse to start on either.
    pub fn from_env() -> AppResult<Self> {
        let encryption_key = EncryptionKey::from_hex(&require_var("TOKEN_ENCRYPTION_KEY")?)?;

        let google = GoogleConfig {
            client_id: require_var("GOOGLE_CLIENT_ID")?,
            client_secret: require_var("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: validated_redirect_uri(&require_var("GOOGLE_REDIRECT_URI")?)?,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        let refresh_buffer_secs: i64 =
            parse_var("TOKEN_REFRESH_BUFFER_SECS", DEFAULT_REFRESH_BUFFER_SECS)?;
        if refresh_buffer_secs < 0 {
            return Err(AppError::config_invalid(
                "TOKEN_REFRESH_BUFFER_SECS must not be negative",
            ));
        }

        let calendar_max_results: u32 =
            parse_var("CALENDAR_MAX_RESULTS", DEFAULT_CALENDAR_MAX_RESULTS)?;

        let timezone = match env::var("CONTEXT_TIMEZONE") {
            Err(_) => Tz::UTC,
            Ok(name) => name.parse().map_err(|_| {
                AppError::config_invalid(format!("CONTEXT_TIMEZONE is not an IANA timezone: {name}"))
            })?,
        };

        Ok(Self {
            encryption_key,
            google,
            database_url,
            refresh_buffer: Duration::seconds(refresh_buffer_secs),
            calendar_max_results,
            timezone,
        })
    }
}

fn require_var(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::config_missing(format!("{name} must be set")))
}

fn parse_var<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|e| AppError::config_invalid(format!("{name} is malformed: {e}"))),
    }
}

fn validated_redirect_uri(raw: &str) -> AppResult<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AppError::config_invalid(format!("GOOGLE_REDIRECT_URI is not a URL: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::config_invalid(
            "GOOGLE_REDIRECT_URI must use http or https",
        ));
    }

    Ok(raw.to_owned())
}
