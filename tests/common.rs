// ABOUTME: Shared helpers for integration tests
// ABOUTME: In-memory database setup and a scriptable fake calendar provider with call counters

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use luma_context_server::crypto::EncryptionKey;
use luma_context_server::database::Database;
use luma_context_server::models::Provider;
use luma_context_server::oauth::{
    CalendarProvider, EventResource, ListEventsParams, ProviderError, TokenGrant,
};

/// Fresh in-memory database with the test key
pub async fn test_database() -> Database {
    Database::new("sqlite::memory:", &EncryptionKey::from_bytes([42u8; 32]))
        .await
        .unwrap()
}

/// A grant expiring comfortably in the future
pub fn grant(access_token: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_owned(),
        refresh_token: None,
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: None,
    }
}

/// Scriptable in-process calendar provider.
///
/// Counts every network-shaped call so tests can assert exactly how many
/// provider round trips a flow performed.
#[derive(Default)]
pub struct FakeCalendarProvider {
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    list_calls: AtomicUsize,
    exchange_grant: Mutex<Option<TokenGrant>>,
    refresh_grant: Mutex<Option<TokenGrant>>,
    events: Mutex<Vec<EventResource>>,
    reject_listing: AtomicBool,
}

impl FakeCalendarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exchange_grant(&self, grant: TokenGrant) {
        *self.exchange_grant.lock().unwrap() = Some(grant);
    }

    pub fn set_refresh_grant(&self, grant: TokenGrant) {
        *self.refresh_grant.lock().unwrap() = Some(grant);
    }

    pub fn set_events(&self, events: Vec<EventResource>) {
        *self.events.lock().unwrap() = events;
    }

    /// Make every listing call fail as an authorization rejection
    pub fn reject_listings(&self) {
        self.reject_listing.store(true, Ordering::SeqCst);
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendarProvider {
    fn kind(&self) -> Provider {
        Provider::GoogleCalendar
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "https://fake.example/auth?state={}",
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, ProviderError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_grant
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::AuthorizationRejected("code rejected".into()))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_grant
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::AuthorizationRejected("grant revoked".into()))
    }

    async fn list_events(
        &self,
        _access_token: &str,
        params: &ListEventsParams,
    ) -> Result<Vec<EventResource>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.reject_listing.load(Ordering::SeqCst) {
            return Err(ProviderError::AuthorizationRejected(
                "access token rejected".into(),
            ));
        }

        let mut events = self.events.lock().unwrap().clone();
        events.truncate(params.max_results as usize);
        Ok(events)
    }
}
