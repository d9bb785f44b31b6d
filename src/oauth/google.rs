// ABOUTME: Google Calendar OAuth provider over reqwest
// ABOUTME: Consent URL building, code exchange, token refresh, and event listing
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Calendar provider implementation

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{CalendarProvider, EventResource, ListEventsParams, ProviderError, TokenGrant};
use crate::models::Provider;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Google Calendar provider talking to the live Google endpoints
pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[derive(Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<EventResource>,
}

impl GoogleCalendarProvider {
    /// Create a provider with the given client credentials
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    fn grant_from_response(response: GoogleTokenResponse) -> TokenGrant {
        TokenGrant {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
            scope: response.scope,
        }
    }

    /// Whether a token-endpoint failure means the grant itself is gone.
    ///
    /// Google reports a revoked or consumed grant as 400 `invalid_grant`;
    /// 401/403 mean our authorization is no longer accepted.
    fn is_grant_rejection(status: reqwest::StatusCode, body: &str) -> bool {
        status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || (status == reqwest::StatusCode::BAD_REQUEST && body.contains("invalid_grant"))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> Provider {
        Provider::GoogleCalendar
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if Self::is_grant_rejection(status, &body) {
                return Err(ProviderError::AuthorizationRejected(format!(
                    "code exchange rejected with {status}: {body}"
                )));
            }
            return Err(ProviderError::ExchangeFailed(format!("{status}: {body}")));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!("exchanged authorization code with google");
        Ok(Self::grant_from_response(token_response))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if Self::is_grant_rejection(status, &body) {
                return Err(ProviderError::AuthorizationRejected(format!(
                    "refresh rejected with {status}: {body}"
                )));
            }
            return Err(ProviderError::RefreshFailed(format!("{status}: {body}")));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!("refreshed google access token");
        Ok(Self::grant_from_response(token_response))
    }

    async fn list_events(
        &self,
        access_token: &str,
        params: &ListEventsParams,
    ) -> Result<Vec<EventResource>, ProviderError> {
        let response = self
            .client
            .get(EVENTS_URL)
            .bearer_auth(access_token)
            .query(&[
                (
                    "timeMin",
                    params.since.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                ("maxResults", params.max_results.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if Self::is_grant_rejection(status, &body) {
                return Err(ProviderError::AuthorizationRejected(format!(
                    "event listing rejected with {status}"
                )));
            }
            return Err(ProviderError::InvalidResponse(format!("{status}: {body}")));
        }

        let events: GoogleEventsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(events.items)
    }
}
