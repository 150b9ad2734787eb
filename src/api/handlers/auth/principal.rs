//! Authenticated principal extraction for protected routes.
//!
//! Every protected handler calls [`require_auth`] first: it reads the bearer
//! access token, verifies signature and expiry through the codec, and hands
//! back the decoded principal. No store lookup happens here; access tokens
//! are stateless by design.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};

use super::identity::Role;
use super::state::AuthState;

/// Decoded access-token identity attached to a request.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Verify the bearer access token, or reject with 401.
///
/// # Errors
/// `StatusCode::UNAUTHORIZED` when the header is absent, malformed, or the
/// token fails verification; the cause is not distinguished.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = auth_state
        .codec()
        .verify_access_token(&token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(Principal {
        id: claims.user.id,
        username: claims.user.username,
        role: claims.user.role,
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
