// ABOUTME: Calendar client combining the token manager with the event listing API
// ABOUTME: Guarantees a usable access token before every upstream call
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calendar access on top of the token lifecycle machinery

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::oauth::{CalendarProvider, EventResource, ListEventsParams, TokenManager};

/// Lists upcoming events for users with a connected calendar
pub struct CalendarService {
    token_manager: Arc<TokenManager>,
    provider: Arc<dyn CalendarProvider>,
    default_max_results: u32,
}

impl CalendarService {
    /// Create a service over the given manager and provider
    #[must_use]
    pub fn new(
        token_manager: Arc<TokenManager>,
        provider: Arc<dyn CalendarProvider>,
        default_max_results: u32,
    ) -> Self {
        Self {
            token_manager,
            provider,
            default_max_results,
        }
    }

    /// List upcoming events starting from now, ordered by start time.
    ///
    /// `max_results` falls back to the configured default when omitted.
    ///
    /// # Errors
    ///
    /// Propagates the token manager's typed errors (`AuthRequired`,
    /// `AuthExpired`, `CredentialCorrupted`) unchanged; listing failures
    /// map to `AuthExpired` when the provider rejected our authorization,
    /// otherwise `ExternalServiceError`.
    pub async fn list_upcoming_events(
        &self,
        user_id: Uuid,
        max_results: Option<u32>,
    ) -> AppResult<Vec<EventResource>> {
        let access_token = self.token_manager.ensure_access_token(user_id).await?;
        let provider = self.provider.kind();

        let params = ListEventsParams {
            since: Utc::now(),
            max_results: max_results.unwrap_or(self.default_max_results),
        };

        let events = self
            .provider
            .list_events(&access_token, &params)
            .await
            .map_err(|e| {
                if e.is_authorization() {
                    AppError::auth_expired(format!("{provider} no longer accepts our access token"))
                        .with_user_id(user_id)
                        .with_source(e)
                } else {
                    AppError::external_service(provider.as_str(), "event listing failed")
                        .with_user_id(user_id)
                        .with_source(e)
                }
            })?;

        debug!(%user_id, %provider, count = events.len(), "listed upcoming events");

        Ok(events)
    }
}
