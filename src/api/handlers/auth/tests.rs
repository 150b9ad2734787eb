//! Auth flow tests over in-memory stores.

use super::identity::{memory::MemoryIdentityStore, Identity, Role};
use super::rate_limit::NoopRateLimiter;
use super::service::AuthError;
use super::session::MemorySessionStore;
use super::state::{AuthConfig, AuthState};
use super::types::MessageResponse;
use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use jsonwebtoken::get_current_timestamp;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// Low bcrypt cost keeps the suite fast; cost selection is not under test.
const TEST_BCRYPT_COST: u32 = 4;

struct Harness {
    state: Arc<AuthState>,
    identities: Arc<MemoryIdentityStore>,
}

async fn harness() -> Harness {
    let identities = Arc::new(MemoryIdentityStore::default());
    identities
        .insert(Identity {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: bcrypt::hash("correct-pw", TEST_BCRYPT_COST).expect("hash"),
            role: Role::Employee,
            active: true,
        })
        .await;

    let config = AuthConfig::new(
        SecretString::from("access-secret".to_string()),
        SecretString::from("refresh-secret".to_string()),
    );
    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.refresh_token_ttl_seconds(),
    )));

    let state = Arc::new(AuthState::new(
        config,
        identities.clone(),
        sessions,
        Arc::new(NoopRateLimiter),
    ));

    Harness { state, identities }
}

#[tokio::test]
async fn login_returns_pair_with_independent_expiry() -> Result<()> {
    let harness = harness().await;

    let before = get_current_timestamp();
    let pair = harness
        .state
        .service()
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;
    let after = get_current_timestamp();

    assert!(!pair.access_token.is_empty());
    assert!(!pair.refresh_token.is_empty());
    assert!(pair.expires_at >= before + 3600);
    assert!(pair.expires_at <= after + 3600);
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let harness = harness().await;
    harness
        .identities
        .insert(Identity {
            id: Uuid::new_v4(),
            username: "carol".to_string(),
            password_hash: bcrypt::hash("carol-pw", TEST_BCRYPT_COST).expect("hash"),
            role: Role::Admin,
            active: false,
        })
        .await;

    for (username, password) in [
        ("alice", "wrong-pw"),
        ("nobody", "correct-pw"),
        ("carol", "carol-pw"),
    ] {
        let err = harness
            .state
            .service()
            .login(username, password)
            .await
            .expect_err("login must fail");
        assert!(matches!(err, AuthError::Unauthorized));
    }
}

#[tokio::test]
async fn refresh_rotates_and_rejects_superseded_tokens() -> Result<()> {
    let harness = harness().await;
    let service = harness.state.service();

    let first = service
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    let second = service
        .refresh(&first.refresh_token)
        .await
        .map_err(|err| anyhow::anyhow!("first refresh failed: {err}"))?;
    assert_ne!(first.refresh_token, second.refresh_token);

    // The superseded token still has a valid signature and embedded expiry,
    // but only the most recently issued token occupies the slot.
    let replay = service.refresh(&first.refresh_token).await;
    assert!(matches!(replay, Err(AuthError::Unauthorized)));

    let third = service
        .refresh(&second.refresh_token)
        .await
        .map_err(|err| anyhow::anyhow!("second refresh failed: {err}"))?;
    assert_ne!(second.refresh_token, third.refresh_token);
    Ok(())
}

#[tokio::test]
async fn second_login_invalidates_earlier_refresh_tokens() -> Result<()> {
    let harness = harness().await;
    let service = harness.state.service();

    let first = service
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;
    let second = service
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    assert!(matches!(
        service.refresh(&first.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));
    assert!(service.refresh(&second.refresh_token).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn malformed_refresh_token_is_forbidden() {
    let harness = harness().await;

    let result = harness.state.service().refresh("not-a-token").await;
    assert!(matches!(result, Err(AuthError::Forbidden)));
}

#[tokio::test]
async fn empty_refresh_token_is_unauthorized() {
    let harness = harness().await;

    let result = harness.state.service().refresh("").await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
}

#[tokio::test]
async fn well_signed_token_without_session_record_is_unauthorized() -> Result<()> {
    let harness = harness().await;

    // Correctly signed, never issued through login: no slot exists for it.
    let forged = harness
        .state
        .config()
        .codec()
        .issue_refresh_token("alice")
        .map_err(|err| anyhow::anyhow!("issue failed: {err}"))?;

    let result = harness.state.service().refresh(&forged).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
    Ok(())
}

#[tokio::test]
async fn refresh_stops_for_deleted_and_deactivated_users() -> Result<()> {
    let harness = harness().await;
    let service = harness.state.service();

    let pair = service
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    harness.identities.set_active("alice", false).await;
    assert!(matches!(
        service.refresh(&pair.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));

    harness.identities.remove("alice").await;
    assert!(matches!(
        service.refresh(&pair.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_session_slot() -> Result<()> {
    let harness = harness().await;
    let service = harness.state.service();

    let pair = service
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    service.logout(Some(&pair.access_token)).await;

    assert!(matches!(
        service.refresh(&pair.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));
    Ok(())
}

#[tokio::test]
async fn logout_without_valid_token_is_a_noop() -> Result<()> {
    let harness = harness().await;
    let service = harness.state.service();

    let pair = service
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    service.logout(None).await;
    service.logout(Some("garbage")).await;

    // The session survives a logout that could not be attributed to a user.
    assert!(service.refresh(&pair.refresh_token).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_of_one_token_yield_a_single_winner() -> Result<()> {
    let harness = harness().await;

    let pair = harness
        .state
        .service()
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    let state_a = harness.state.clone();
    let state_b = harness.state.clone();
    let token_a = pair.refresh_token.clone();
    let token_b = pair.refresh_token.clone();

    let (first, second) = tokio::join!(
        async move { state_a.service().refresh(&token_a).await },
        async move { state_b.service().refresh(&token_b).await },
    );

    // The per-user lock serializes the read-check-write window, so exactly
    // one caller rotates the token and the other sees a stale slot.
    let successes = [&first, &second]
        .iter()
        .filter(|result| result.is_ok())
        .count();
    assert_eq!(successes, 1);

    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AuthError::Unauthorized)));
    Ok(())
}

#[tokio::test]
async fn login_handler_reports_uniform_unauthorized_body() -> Result<()> {
    let harness = harness().await;

    let response = super::login(
        HeaderMap::new(),
        Extension(harness.state.clone()),
        Some(Json(super::types::LoginRequest {
            username: "alice".to_string(),
            password: "wrong-pw".to_string(),
        })),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body: MessageResponse = serde_json::from_slice(&bytes)?;
    assert_eq!(body.message, "Unauthorized");
    Ok(())
}

#[tokio::test]
async fn refresh_handler_maps_statuses() -> Result<()> {
    let harness = harness().await;

    // Malformed token: 403.
    let response = super::refresh(
        HeaderMap::new(),
        Extension(harness.state.clone()),
        Some(Json(super::types::RefreshRequest {
            refresh_token: "not-a-token".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Missing payload counts as a missing token: 401.
    let response = super::refresh(HeaderMap::new(), Extension(harness.state.clone()), None)
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_handler_always_succeeds() -> Result<()> {
    let harness = harness().await;

    let response = super::logout(HeaderMap::new(), Extension(harness.state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let pair = harness
        .state
        .service()
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", pair.access_token))
            .context("authorization header")?,
    );
    let response = super::logout(headers, Extension(harness.state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(matches!(
        harness.state.service().refresh(&pair.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));
    Ok(())
}

#[tokio::test]
async fn gate_accepts_valid_and_rejects_expired_tokens() -> Result<()> {
    let harness = harness().await;

    let pair = harness
        .state
        .service()
        .login("alice", "correct-pw")
        .await
        .map_err(|err| anyhow::anyhow!("login failed: {err}"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", pair.access_token))
            .context("authorization header")?,
    );
    let principal = super::principal::require_auth(&headers, &harness.state)
        .map_err(|status| anyhow::anyhow!("expected principal, got {status}"))?;
    assert_eq!(principal.username, "alice");
    assert_eq!(principal.role, Role::Employee);
    assert_eq!(principal.expires_at, principal.issued_at + 3600);

    // A refresh token in the Authorization header never passes the gate.
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", pair.refresh_token))
            .context("authorization header")?,
    );
    assert!(matches!(
        super::principal::require_auth(&headers, &harness.state),
        Err(StatusCode::UNAUTHORIZED)
    ));
    Ok(())
}
