// ABOUTME: Unified error handling with standard error codes for all modules
// ABOUTME: Distinguishes unauthenticated, corrupted-credential, upstream, and config failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Unified Error Handling
//!
//! Central error types for the context service. The codes carry the
//! taxonomy the snapshot aggregator relies on: `Unauthenticated`-class
//! failures are expected (the user never connected, or must re-run the
//! authorization handshake) while everything else is worth alerting on.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No credential exists; the user never completed the authorization flow
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    /// Credential is stale and cannot be refreshed; re-authentication needed
    #[serde(rename = "AUTH_EXPIRED")]
    AuthExpired,
    /// A stored secret failed its integrity check during decryption
    #[serde(rename = "CREDENTIAL_CORRUPTED")]
    CredentialCorrupted,
    /// The provided input is invalid
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    /// The requested resource was not found
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// An upstream service failed for reasons unrelated to authorization
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError,
    /// Required configuration is missing
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing,
    /// Configuration is present but invalid
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    /// An internal error occurred
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication with the provider is required",
            Self::AuthExpired => "Provider authentication has expired",
            Self::CredentialCorrupted => "Stored credential failed its integrity check",
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ExternalServiceError => "An external service encountered an error",
            Self::ConfigMissing => "Required configuration is missing",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::DatabaseError => "Database operation failed",
            Self::InternalError => "An internal error occurred",
        }
    }

    /// Whether the caller's remedy is to re-run the authorization handshake
    #[must_use]
    pub const fn is_unauthenticated(self) -> bool {
        matches!(self, Self::AuthRequired | Self::AuthExpired)
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
#[error("{}: {message}", .code.description())]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Owner the failure relates to, when known
    pub user_id: Option<Uuid>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            user_id: None,
            source: None,
        }
    }

    /// Attach the owner this failure relates to
    #[must_use]
    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach a source error for chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the caller's remedy is to re-run the authorization handshake
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        self.code.is_unauthenticated()
    }

    /// No credential exists for this user and provider
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Credential expired and cannot be refreshed
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthExpired, message)
    }

    /// Stored secret failed decryption or integrity verification
    pub fn credential_corrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CredentialCorrupted, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Upstream failure unrelated to authorization
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// Required configuration is missing
    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigMissing, message)
    }

    /// Configuration is present but invalid
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}
