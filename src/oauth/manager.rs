// ABOUTME: Token lifecycle manager: freshness checks, guarded refresh, authorization flow
// ABOUTME: Serializes concurrent refreshes per (user, provider) so only one provider call happens
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Token Lifecycle Management
//!
//! [`TokenManager`] guarantees callers a usable access token or a typed
//! failure telling them why none exists. Every lookup re-evaluates the
//! credential: fresh tokens are returned as-is, stale ones are refreshed
//! behind a per-(user, provider) mutex, and anything unrecoverable maps to
//! the Unauthenticated or corrupted-credential error classes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CalendarProvider, TokenGrant};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{CredentialUpdate, OAuthCredential, Provider};

/// Pending authorization states expire after this many minutes
const STATE_TTL_MINUTES: i64 = 10;

/// In-flight authorization handshake, keyed by its state string
struct PendingState {
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

/// Result of a completed authorization handshake
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    /// Owner the credential was stored for
    pub user_id: Uuid,
    /// Provider that was connected
    pub provider: Provider,
    /// Expiry of the granted access token, when reported
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes, when reported
    pub scope: Option<String>,
}

/// Manages the OAuth token lifecycle for one provider
pub struct TokenManager {
    database: Database,
    provider: Arc<dyn CalendarProvider>,
    refresh_buffer: Duration,
    refresh_locks: DashMap<(Uuid, Provider), Arc<Mutex<()>>>,
    pending_states: RwLock<HashMap<String, PendingState>>,
}

impl TokenManager {
    /// Create a manager over the given store and provider.
    ///
    /// `refresh_buffer` is how far before the recorded expiry a token is
    /// already treated as stale.
    #[must_use]
    pub fn new(database: Database, provider: Arc<dyn CalendarProvider>, refresh_buffer: Duration) -> Self {
        Self {
            database,
            provider,
            refresh_buffer,
            refresh_locks: DashMap::new(),
            pending_states: RwLock::new(HashMap::new()),
        }
    }

    /// Which provider this manager serves
    #[must_use]
    pub fn provider_kind(&self) -> Provider {
        self.provider.kind()
    }

    /// Return an access token guaranteed usable for at least the refresh
    /// buffer, refreshing it first if necessary.
    ///
    /// Concurrent callers for the same user serialize on an async mutex;
    /// the waiter re-reads the store and reuses the winner's fresh token
    /// instead of issuing a second provider call.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` when no credential is stored.
    /// - `AuthExpired` when the token is stale and there is no refresh
    ///   token, or the refresh call fails.
    /// - `CredentialCorrupted` when a stored envelope fails decryption.
    pub async fn ensure_access_token(&self, user_id: Uuid) -> AppResult<String> {
        let provider = self.provider.kind();

        let credential = self
            .database
            .get_oauth_credential(user_id, provider)
            .await?
            .ok_or_else(|| {
                AppError::auth_required(format!("no {provider} credential stored"))
                    .with_user_id(user_id)
            })?;

        if let Some(token) = self.usable_access_token(&credential)? {
            return Ok(token);
        }

        // Hold the per-(user, provider) lock across the whole
        // read-refresh-persist sequence. The entry ref must not live past
        // this block or it would pin the shard across an await.
        let lock = {
            let entry = self
                .refresh_locks
                .entry((user_id, provider))
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        let credential = self
            .database
            .get_oauth_credential(user_id, provider)
            .await?
            .ok_or_else(|| {
                AppError::auth_required(format!("{provider} credential was removed"))
                    .with_user_id(user_id)
            })?;

        if let Some(token) = self.usable_access_token(&credential)? {
            debug!(%user_id, %provider, "reusing token refreshed by a concurrent caller");
            return Ok(token);
        }

        self.refresh_and_persist(&credential).await
    }

    /// Decrypt the credential and return its access token if still fresh.
    ///
    /// # Errors
    ///
    /// Returns `CredentialCorrupted` when an envelope fails decryption.
    fn usable_access_token(&self, credential: &OAuthCredential) -> AppResult<Option<String>> {
        let tokens = self.database.reveal_tokens(credential).map_err(|e| {
            AppError::credential_corrupted(format!(
                "stored {} credential failed decryption",
                credential.provider
            ))
            .with_user_id(credential.user_id)
            .with_source(e)
        })?;

        if !tokens.access_token.is_empty() && self.is_fresh(credential.expires_at) {
            Ok(Some(tokens.access_token))
        } else {
            Ok(None)
        }
    }

    /// A token with no recorded expiry is assumed usable
    fn is_fresh(&self, expires_at: Option<DateTime<Utc>>) -> bool {
        match expires_at {
            None => true,
            Some(expires_at) => expires_at > Utc::now() + self.refresh_buffer,
        }
    }

    async fn refresh_and_persist(&self, credential: &OAuthCredential) -> AppResult<String> {
        let user_id = credential.user_id;
        let provider = credential.provider;

        let tokens = self.database.reveal_tokens(credential).map_err(|e| {
            AppError::credential_corrupted(format!(
                "stored {provider} credential failed decryption"
            ))
            .with_user_id(user_id)
            .with_source(e)
        })?;

        let Some(refresh_token) = tokens.refresh_token else {
            return Err(AppError::auth_expired(format!(
                "{provider} access token expired and no refresh token is stored"
            ))
            .with_user_id(user_id));
        };

        let grant = match self.provider.refresh(&refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(%user_id, %provider, error = %e, "token refresh failed");
                return Err(AppError::auth_expired(format!(
                    "{provider} token refresh failed; re-authorization needed"
                ))
                .with_user_id(user_id)
                .with_source(e));
            }
        };

        self.persist_grant(user_id, &grant).await?;
        info!(%user_id, %provider, "refreshed access token");

        Ok(grant.access_token)
    }

    /// Store a grant through the vault's merge semantics, preserving a
    /// previously issued refresh token when the response omits one.
    async fn persist_grant(&self, user_id: Uuid, grant: &TokenGrant) -> AppResult<()> {
        let update = CredentialUpdate {
            access_token: Some(grant.access_token.clone()),
            refresh_token: grant.refresh_token.clone(),
            expires_at: grant.expires_at,
            scope: grant.scope.clone(),
        };

        self.database
            .upsert_oauth_credential(user_id, self.provider.kind(), &update)
            .await
    }

    /// Build the consent URL for a user and register its state.
    ///
    /// The state string carries the owner id, since the eventual callback
    /// arrives with no session attached.
    pub async fn authorization_url(&self, user_id: Uuid) -> String {
        let state = format!("{user_id}:{}", Uuid::new_v4());

        let mut states = self.pending_states.write().await;
        states.retain(|_, pending| !Self::state_expired(pending.created_at));
        states.insert(
            state.clone(),
            PendingState {
                user_id,
                created_at: Utc::now(),
            },
        );
        drop(states);

        self.provider.authorization_url(&state)
    }

    /// Complete the authorization handshake from the provider callback.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when the state is unknown or expired.
    /// - `AuthRequired` when the provider rejected the code.
    /// - `ExternalServiceError` for other exchange failures.
    pub async fn handle_callback(&self, code: &str, state: &str) -> AppResult<ConnectionSummary> {
        let user_id = self.consume_state(state).await.ok_or_else(|| {
            AppError::invalid_input("authorization state is unknown or expired")
        })?;
        let provider = self.provider.kind();

        let grant = self.provider.exchange_code(code).await.map_err(|e| {
            if e.is_authorization() {
                AppError::auth_required(format!("{provider} rejected the authorization code"))
                    .with_user_id(user_id)
                    .with_source(e)
            } else {
                AppError::external_service(provider.as_str(), "authorization code exchange failed")
                    .with_user_id(user_id)
                    .with_source(e)
            }
        })?;

        self.persist_grant(user_id, &grant).await?;
        info!(%user_id, %provider, "completed authorization handshake");

        Ok(ConnectionSummary {
            user_id,
            provider,
            expires_at: grant.expires_at,
            scope: grant.scope,
        })
    }

    /// Remove the stored credential for a user.
    ///
    /// Returns whether a credential existed.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the deletion fails.
    pub async fn disconnect(&self, user_id: Uuid) -> AppResult<bool> {
        let provider = self.provider.kind();
        let removed = self
            .database
            .delete_oauth_credential(user_id, provider)
            .await?;

        if removed {
            info!(%user_id, %provider, "disconnected provider");
        }

        Ok(removed)
    }

    /// Validate and consume a pending state, single use
    async fn consume_state(&self, state: &str) -> Option<Uuid> {
        let mut states = self.pending_states.write().await;
        let pending = states.remove(state)?;

        if Self::state_expired(pending.created_at) {
            return None;
        }

        // The state embeds the owner id; both records must agree.
        let embedded = state.split(':').next().and_then(|s| Uuid::parse_str(s).ok())?;
        if embedded != pending.user_id {
            return None;
        }

        Some(pending.user_id)
    }

    fn state_expired(created_at: DateTime<Utc>) -> bool {
        Utc::now() - created_at > Duration::minutes(STATE_TTL_MINUTES)
    }
}
