// ABOUTME: Database management for credential and task storage
// ABOUTME: Owns the SQLite pool and the envelope cipher used at the storage boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Database Management
//!
//! SQLite-backed durable storage. The `Database` handle owns both the
//! connection pool and the envelope cipher, so token material is encrypted
//! the moment it crosses the storage boundary and callers above this layer
//! only ever see envelopes or explicitly revealed plaintext.

mod oauth_tokens;
mod tasks;

pub use oauth_tokens::PlainTokens;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};

use crate::crypto::{EncryptionKey, EnvelopeCipher};
use crate::errors::AppResult;

/// Database manager for credential and task storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    cipher: EnvelopeCipher,
}

impl Database {
    /// Create a new database connection and run migrations.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the connection cannot be established
    /// or a migration fails.
    pub async fn new(database_url: &str, key: &EncryptionKey) -> AppResult<Self> {
        // An in-memory database exists per connection, so the pool must be
        // pinned to a single connection that never closes.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await?
        } else {
            // Ensure SQLite creates the database file if it doesn't exist
            let connection_options = if database_url.starts_with("sqlite:") {
                format!("{database_url}?mode=rwc")
            } else {
                database_url.to_string()
            };
            SqlitePool::connect(&connection_options).await?
        };

        let db = Self {
            pool,
            cipher: EnvelopeCipher::new(key),
        };

        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub(crate) const fn cipher(&self) -> &EnvelopeCipher {
        &self.cipher
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if table or index creation fails.
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_oauth_credentials().await?;
        self.migrate_tasks().await?;
        Ok(())
    }
}
