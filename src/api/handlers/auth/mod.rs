//! Authentication endpoints and the auth core behind them.
//!
//! Flow Overview: handlers stay thin; they deserialize, consult the rate
//! limiter, call the orchestrator, and map its outcome to a status code.
//! Uniform "Unauthorized"/"Forbidden" bodies never reveal which check failed.

pub mod credentials;
pub mod identity;
pub mod principal;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod state;
pub mod token;
pub mod types;

#[cfg(test)]
mod tests;

pub use state::{AuthConfig, AuthState};

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

use self::principal::extract_bearer_token;
use self::rate_limit::{RateLimitAction, RateLimitDecision};
use self::service::{AuthError, TokenPair};
use self::types::{LoginRequest, MessageResponse, RefreshRequest, TokenPairResponse};

#[utoipa::path(
    post,
    path = "/auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPairResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if rate_limited(
        &headers,
        &auth_state,
        Some(&request.username),
        RateLimitAction::Login,
    ) {
        return message(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    match auth_state
        .service()
        .login(&request.username, &request.password)
        .await
    {
        Ok(pair) => token_pair_response(pair),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = TokenPairResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Forbidden", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    // A missing body counts as a missing token: 401, not a validation error.
    let refresh_token = match payload {
        Some(Json(payload)) => payload.refresh_token,
        None => return message(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };

    if rate_limited(&headers, &auth_state, None, RateLimitAction::Refresh) {
        return message(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    match auth_state.service().refresh(&refresh_token).await {
        Ok(pair) => token_pair_response(pair),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let token = extract_bearer_token(&headers);
    auth_state.service().logout(token.as_deref()).await;

    // Neutral success regardless of prior session state.
    message(StatusCode::OK, "Logged out")
}

fn token_pair_response(pair: TokenPair) -> Response {
    (
        StatusCode::OK,
        Json(TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.expires_at,
        }),
    )
        .into_response()
}

fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Unauthorized => message(StatusCode::UNAUTHORIZED, "Unauthorized"),
        AuthError::Forbidden => message(StatusCode::FORBIDDEN, "Forbidden"),
        AuthError::Internal(cause) => {
            error!("Auth dependency failure: {cause}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

pub(crate) fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: text.to_string(),
        }),
    )
        .into_response()
}

fn rate_limited(
    headers: &HeaderMap,
    auth_state: &AuthState,
    username: Option<&str>,
    action: RateLimitAction,
) -> bool {
    let client_ip = extract_client_ip(headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), action)
        == RateLimitDecision::Limited
    {
        return true;
    }

    if let Some(username) = username {
        if auth_state.rate_limiter().check_username(username, action)
            == RateLimitDecision::Limited
        {
            return true;
        }
    }

    false
}

/// Extract a client IP for rate limiting from common proxy headers.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for") {
        if let Ok(value) = value.to_str() {
            if let Some(first) = value.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
