// ABOUTME: Credential vault operations, one encrypted row per (user, provider)
// ABOUTME: Field-wise merge on write so a refresh never erases a stored refresh token
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{TimeZone, Utc};
use sqlx::Row;
use tracing::{debug, warn};
use uuid::Uuid;

use super::Database;
use crate::crypto::EnvelopeFailure;
use crate::errors::{AppError, AppResult};
use crate::models::{CredentialUpdate, OAuthCredential, Provider};

/// Decrypted token pair handed to the refresh engine.
///
/// Never stored; exists only for the duration of a freshness check or an
/// upstream call.
pub struct PlainTokens {
    /// Decrypted access token
    pub access_token: String,
    /// Decrypted refresh token, when one was ever granted
    pub refresh_token: Option<String>,
}

impl Database {
    /// Create the `oauth_credentials` table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_oauth_credentials(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_credentials (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at_ms INTEGER,
                scope TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE(user_id, provider)
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_oauth_credentials_user ON oauth_credentials(user_id)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Create or merge the credential for a (user, provider) pair.
    ///
    /// Presence decides everything: the access token is overwritten when
    /// the update carries one, the refresh token only when the provider
    /// reissued one, expiry and scope on explicit presence. Creating a
    /// credential without a non-empty access token is a logged no-op, so a
    /// degenerate provider response can never produce an unusable row.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` on query failure or an internal error if
    /// encryption fails.
    pub async fn upsert_oauth_credential(
        &self,
        user_id: Uuid,
        provider: Provider,
        update: &CredentialUpdate,
    ) -> AppResult<()> {
        let access_token = update
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty());

        if update.access_token.as_deref().is_some_and(str::is_empty) {
            warn!(%user_id, %provider, "ignoring empty access token in credential update");
        }

        let existing = self.get_oauth_credential(user_id, provider).await?;
        let now = Utc::now();

        match existing {
            None => {
                let Some(access_token) = access_token else {
                    warn!(
                        %user_id, %provider,
                        "skipping credential creation without an access token"
                    );
                    return Ok(());
                };

                let access_envelope = self
                    .cipher()
                    .encrypt(Some(access_token))?
                    .ok_or_else(|| AppError::internal("encryption produced no envelope"))?;
                let refresh_envelope = self.cipher().encrypt(update.refresh_token.as_deref())?;

                sqlx::query(
                    r"
                    INSERT INTO oauth_credentials (
                        id, user_id, provider, access_token, refresh_token,
                        expires_at_ms, scope, created_at, updated_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(user_id.to_string())
                .bind(provider.as_str())
                .bind(access_envelope)
                .bind(refresh_envelope)
                .bind(update.expires_at.map(|t| t.timestamp_millis()))
                .bind(update.scope.as_deref())
                .bind(now)
                .bind(now)
                .execute(self.pool())
                .await?;

                debug!(%user_id, %provider, "stored new credential");
            }
            Some(current) => {
                let access_envelope = match access_token {
                    Some(token) => self
                        .cipher()
                        .encrypt(Some(token))?
                        .ok_or_else(|| AppError::internal("encryption produced no envelope"))?,
                    None => current.access_token,
                };

                // An omitted refresh token keeps the stored envelope; a
                // refresh response without one must not erase the grant.
                let refresh_envelope = match update.refresh_token.as_deref() {
                    Some(token) => self.cipher().encrypt(Some(token))?,
                    None => current.refresh_token,
                };

                let expires_at = update.expires_at.or(current.expires_at);
                let scope = update.scope.clone().or(current.scope);

                sqlx::query(
                    r"
                    UPDATE oauth_credentials
                    SET access_token = $1, refresh_token = $2, expires_at_ms = $3,
                        scope = $4, updated_at = $5
                    WHERE user_id = $6 AND provider = $7
                    ",
                )
                .bind(access_envelope)
                .bind(refresh_envelope)
                .bind(expires_at.map(|t| t.timestamp_millis()))
                .bind(scope)
                .bind(now)
                .bind(user_id.to_string())
                .bind(provider.as_str())
                .execute(self.pool())
                .await?;

                debug!(%user_id, %provider, "merged credential update");
            }
        }

        Ok(())
    }

    /// Look up the stored credential for a (user, provider) pair.
    ///
    /// Token fields stay encrypted in the returned row; use
    /// [`Database::reveal_tokens`] to decrypt them.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the query fails.
    pub async fn get_oauth_credential(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> AppResult<Option<OAuthCredential>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, provider, access_token, refresh_token,
                   expires_at_ms, scope, created_at, updated_at
            FROM oauth_credentials
            WHERE user_id = $1 AND provider = $2
            ",
        )
        .bind(user_id.to_string())
        .bind(provider.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_credential(&row)?)))
    }

    /// Delete the stored credential for a (user, provider) pair.
    ///
    /// Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the query fails.
    pub async fn delete_oauth_credential(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM oauth_credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id.to_string())
        .bind(provider.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Decrypt the token envelopes of a stored credential.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeFailure`] when either envelope is malformed or
    /// fails its integrity check; the caller decides how to surface the
    /// corruption.
    pub fn reveal_tokens(&self, credential: &OAuthCredential) -> Result<PlainTokens, EnvelopeFailure> {
        let access_token = self
            .cipher()
            .decrypt(Some(&credential.access_token))?
            .ok_or(EnvelopeFailure)?;
        let refresh_token = self.cipher().decrypt(credential.refresh_token.as_deref())?;

        Ok(PlainTokens {
            access_token,
            refresh_token,
        })
    }

    fn row_to_credential(row: &sqlx::sqlite::SqliteRow) -> AppResult<OAuthCredential> {
        let user_id_str: String = row.get("user_id");
        let user_id = Uuid::parse_str(&user_id_str)
            .map_err(|e| AppError::database(format!("invalid user id in credential row: {e}")))?;

        let provider_str: String = row.get("provider");
        let provider: Provider = provider_str
            .parse()
            .map_err(|_| AppError::database(format!("unknown provider in credential row: {provider_str}")))?;

        let expires_at = row
            .get::<Option<i64>, _>("expires_at_ms")
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(OAuthCredential {
            id: row.get("id"),
            user_id,
            provider,
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            expires_at,
            scope: row.get("scope"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
