// ABOUTME: Integration tests for the token lifecycle manager
// ABOUTME: Covers freshness states, guarded refresh, and the authorization handshake

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use common::{grant, test_database, FakeCalendarProvider};
use luma_context_server::database::Database;
use luma_context_server::errors::ErrorCode;
use luma_context_server::models::{CredentialUpdate, Provider};
use luma_context_server::oauth::{TokenGrant, TokenManager};

const PROVIDER: Provider = Provider::GoogleCalendar;

async fn setup() -> (Database, Arc<FakeCalendarProvider>, Arc<TokenManager>) {
    let db = test_database().await;
    let provider = Arc::new(FakeCalendarProvider::new());
    let manager = Arc::new(TokenManager::new(
        db.clone(),
        provider.clone(),
        Duration::seconds(60),
    ));
    (db, provider, manager)
}

async fn seed_credential(
    db: &Database,
    user_id: Uuid,
    access: &str,
    refresh: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) {
    db.upsert_oauth_credential(
        user_id,
        PROVIDER,
        &CredentialUpdate {
            access_token: Some(access.to_owned()),
            refresh_token: refresh.map(str::to_owned),
            expires_at,
            scope: None,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn fresh_token_is_returned_without_provider_calls() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "live", Some("rt"), Some(Utc::now() + Duration::hours(1))).await;

    let token = manager.ensure_access_token(user_id).await.unwrap();

    assert_eq!(token, "live");
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn token_without_expiry_is_assumed_usable() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "no-expiry", None, None).await;

    assert_eq!(manager.ensure_access_token(user_id).await.unwrap(), "no-expiry");
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_exactly_once() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "stale", Some("rt"), Some(Utc::now() - Duration::hours(1))).await;
    provider.set_refresh_grant(grant("fresh"));

    assert_eq!(manager.ensure_access_token(user_id).await.unwrap(), "fresh");
    assert_eq!(provider.refresh_calls(), 1);

    // Second access within the buffer reuses the persisted token
    assert_eq!(manager.ensure_access_token(user_id).await.unwrap(), "fresh");
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn refresh_preserves_the_stored_refresh_token() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "stale", Some("rt"), Some(Utc::now() - Duration::hours(1))).await;
    // The refresh response carries no refresh token, as Google's usually don't
    provider.set_refresh_grant(grant("fresh"));

    manager.ensure_access_token(user_id).await.unwrap();

    let credential = db
        .get_oauth_credential(user_id, PROVIDER)
        .await
        .unwrap()
        .unwrap();
    let tokens = db.reveal_tokens(&credential).unwrap();
    assert_eq!(tokens.access_token, "fresh");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
}

#[tokio::test]
async fn expiry_within_the_buffer_counts_as_stale() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "soon-stale", Some("rt"), Some(Utc::now() + Duration::seconds(30)))
        .await;
    provider.set_refresh_grant(grant("fresh"));

    assert_eq!(manager.ensure_access_token(user_id).await.unwrap(), "fresh");
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn expired_without_refresh_token_requires_reauthorization() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "stale", None, Some(Utc::now() - Duration::hours(1))).await;

    let error = manager.ensure_access_token(user_id).await.unwrap_err();

    assert_eq!(error.code, ErrorCode::AuthExpired);
    assert!(error.is_unauthenticated());
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn rejected_refresh_requires_reauthorization() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "stale", Some("rt"), Some(Utc::now() - Duration::hours(1))).await;
    // No refresh grant configured: the fake rejects the call

    let error = manager.ensure_access_token(user_id).await.unwrap_err();

    assert_eq!(error.code, ErrorCode::AuthExpired);
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn missing_credential_requires_authorization() {
    let (_db, provider, manager) = setup().await;

    let error = manager.ensure_access_token(Uuid::new_v4()).await.unwrap_err();

    assert_eq!(error.code, ErrorCode::AuthRequired);
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn corrupted_credential_is_reported_distinctly() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "live", Some("rt"), Some(Utc::now() + Duration::hours(1))).await;

    sqlx::query("UPDATE oauth_credentials SET access_token = 'garbage' WHERE user_id = $1")
        .bind(user_id.to_string())
        .execute(db.pool())
        .await
        .unwrap();

    let error = manager.ensure_access_token(user_id).await.unwrap_err();

    assert_eq!(error.code, ErrorCode::CredentialCorrupted);
    assert!(!error.is_unauthenticated());
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn concurrent_callers_share_a_single_refresh() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "stale", Some("rt"), Some(Utc::now() - Duration::hours(1))).await;
    provider.set_refresh_grant(grant("fresh"));

    let (first, second) = tokio::join!(
        manager.ensure_access_token(user_id),
        manager.ensure_access_token(user_id)
    );

    assert_eq!(first.unwrap(), "fresh");
    assert_eq!(second.unwrap(), "fresh");
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn authorization_handshake_stores_a_usable_credential() {
    let (_db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    provider.set_exchange_grant(TokenGrant {
        refresh_token: Some("granted-rt".into()),
        scope: Some("calendar.readonly".into()),
        ..grant("granted-access")
    });

    let url = manager.authorization_url(user_id).await;
    let state = url
        .split("state=")
        .nth(1)
        .map(|s| urlencoding::decode(s).unwrap().into_owned())
        .unwrap();

    let summary = manager.handle_callback("auth-code", &state).await.unwrap();
    assert_eq!(summary.user_id, user_id);
    assert_eq!(summary.provider, PROVIDER);
    assert_eq!(provider.exchange_calls(), 1);

    // The stored grant serves requests without further provider calls
    let token = manager.ensure_access_token(user_id).await.unwrap();
    assert_eq!(token, "granted-access");
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn unknown_state_is_rejected_before_any_exchange() {
    let (_db, provider, manager) = setup().await;

    let error = manager
        .handle_callback("auth-code", "bogus-state")
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::InvalidInput);
    assert_eq!(provider.exchange_calls(), 0);
}

#[tokio::test]
async fn disconnect_removes_the_credential() {
    let (db, provider, manager) = setup().await;
    let user_id = Uuid::new_v4();
    seed_credential(&db, user_id, "live", Some("rt"), None).await;

    assert!(manager.disconnect(user_id).await.unwrap());
    assert!(!manager.disconnect(user_id).await.unwrap());

    let error = manager.ensure_access_token(user_id).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::AuthRequired);
    assert_eq!(provider.refresh_calls(), 0);
}
