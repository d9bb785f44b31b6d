// ABOUTME: Integration tests for environment configuration loading
// ABOUTME: Serialized because they mutate process-wide environment variables

#![allow(clippy::unwrap_used)]

use std::env;

use serial_test::serial;

use luma_context_server::config::ServerConfig;
use luma_context_server::errors::ErrorCode;

const ALL_VARS: &[&str] = &[
    "TOKEN_ENCRYPTION_KEY",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_REDIRECT_URI",
    "DATABASE_URL",
    "TOKEN_REFRESH_BUFFER_SECS",
    "CALENDAR_MAX_RESULTS",
    "CONTEXT_TIMEZONE",
];

fn reset_env() {
    for var in ALL_VARS {
        env::remove_var(var);
    }
    env::set_var("TOKEN_ENCRYPTION_KEY", "ab".repeat(32));
    env::set_var("GOOGLE_CLIENT_ID", "client-id");
    env::set_var("GOOGLE_CLIENT_SECRET", "client-secret");
    env::set_var("GOOGLE_REDIRECT_URI", "https://app.example.com/oauth/callback");
}

#[test]
#[serial]
fn loads_with_defaults() {
    reset_env();

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.google.client_id, "client-id");
    assert_eq!(config.database_url, "sqlite:data/luma.db");
    assert_eq!(config.refresh_buffer.num_seconds(), 60);
    assert_eq!(config.calendar_max_results, 5);
    assert_eq!(config.timezone.name(), "UTC");
}

#[test]
#[serial]
fn overrides_are_honored() {
    reset_env();
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("TOKEN_REFRESH_BUFFER_SECS", "120");
    env::set_var("CALENDAR_MAX_RESULTS", "10");
    env::set_var("CONTEXT_TIMEZONE", "Europe/Dublin");

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.database_url, "sqlite::memory:");
    assert_eq!(config.refresh_buffer.num_seconds(), 120);
    assert_eq!(config.calendar_max_results, 10);
    assert_eq!(config.timezone.name(), "Europe/Dublin");
}

#[test]
#[serial]
fn debug_output_redacts_the_encryption_key() {
    reset_env();

    let config = ServerConfig::from_env().unwrap();
    let rendered = format!("{config:?}");

    assert!(rendered.contains("EncryptionKey(..)"));
    assert!(!rendered.contains(&"ab".repeat(16)));
}

#[test]
#[serial]
fn missing_encryption_key_refuses_startup() {
    reset_env();
    env::remove_var("TOKEN_ENCRYPTION_KEY");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigMissing);
}

#[test]
#[serial]
fn short_encryption_key_refuses_startup() {
    reset_env();
    env::set_var("TOKEN_ENCRYPTION_KEY", "ab".repeat(16));

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn non_hex_encryption_key_refuses_startup() {
    reset_env();
    env::set_var("TOKEN_ENCRYPTION_KEY", "zz".repeat(32));

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn malformed_redirect_uri_refuses_startup() {
    reset_env();
    env::set_var("GOOGLE_REDIRECT_URI", "not a url");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn non_http_redirect_uri_refuses_startup() {
    reset_env();
    env::set_var("GOOGLE_REDIRECT_URI", "ftp://app.example.com/callback");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn unknown_timezone_refuses_startup() {
    reset_env();
    env::set_var("CONTEXT_TIMEZONE", "Mars/Olympus_Mons");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn negative_refresh_buffer_refuses_startup() {
    reset_env();
    env::set_var("TOKEN_REFRESH_BUFFER_SECS", "-5");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
}
