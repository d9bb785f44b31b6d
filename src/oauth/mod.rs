// ABOUTME: OAuth provider abstraction and token lifecycle management
// ABOUTME: Defines the provider trait, grant/response types, and provider-level errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # OAuth Provider Abstraction
//!
//! The [`CalendarProvider`] trait is the seam between the token lifecycle
//! machinery and a concrete remote service. The refresh engine and the
//! calendar client only speak this trait, so tests substitute a fake
//! provider and the Google client stays an implementation detail.

pub mod google;
pub mod manager;

pub use google::GoogleCalendarProvider;
pub use manager::{ConnectionSummary, TokenManager};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::Provider;

/// Errors from a concrete provider implementation
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected our authorization; the grant is gone or revoked
    #[error("authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// The authorization-code exchange failed
    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    /// The refresh call failed for a non-authorization reason
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Transport-level failure talking to the provider
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a body we could not interpret
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the remedy is re-running the authorization handshake
    #[must_use]
    pub const fn is_authorization(&self) -> bool {
        matches!(self, Self::AuthorizationRejected(_))
    }
}

/// Normalized token grant from an exchange or refresh call.
///
/// Every field except the access token is optional: refresh responses
/// routinely omit the refresh token, and some grants carry no expiry.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Bearer access token, plaintext
    pub access_token: String,
    /// Refresh token, only when the provider issued one in this response
    pub refresh_token: Option<String>,
    /// Instant the access token expires, when the provider reported one
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes as reported by the provider
    pub scope: Option<String>,
}

/// Parameters for an upcoming-events listing
#[derive(Debug, Clone, Copy)]
pub struct ListEventsParams {
    /// Only events starting at or after this instant
    pub since: DateTime<Utc>,
    /// Upper bound on returned events
    pub max_results: u32,
}

/// One boundary of an event as the provider reports it.
///
/// Timed events carry `date_time` (RFC 3339); all-day events carry only
/// `date` (`YYYY-MM-DD`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    /// RFC 3339 instant for timed events
    pub date_time: Option<String>,
    /// Calendar date for all-day events
    pub date: Option<String>,
}

impl EventTime {
    /// The best available representation: the precise instant when the
    /// event is timed, otherwise the all-day date.
    #[must_use]
    pub fn as_instant(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// Raw calendar event as returned by the provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResource {
    /// Event title
    pub summary: Option<String>,
    /// Free-form location text
    pub location: Option<String>,
    /// Event start
    pub start: Option<EventTime>,
    /// Event end
    pub end: Option<EventTime>,
}

/// A remote calendar service reachable through OAuth.
///
/// Implementations handle wire formats and endpoint quirks; callers get
/// normalized grants and event resources.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Which provider this implementation talks to
    fn kind(&self) -> Provider;

    /// Build the user-facing consent URL carrying the given state
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a token grant
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the exchange is rejected or fails.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Obtain a fresh access token from a refresh token
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AuthorizationRejected`] when the grant was
    /// revoked, or another variant for transport and protocol failures.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    /// List upcoming events, ordered by start time
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the listing call fails.
    async fn list_events(
        &self,
        access_token: &str,
        params: &ListEventsParams,
    ) -> Result<Vec<EventResource>, ProviderError>;
}
