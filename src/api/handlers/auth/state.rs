//! Auth configuration and shared per-process auth state.

use secrecy::SecretString;
use std::sync::Arc;

use super::identity::IdentityStore;
use super::rate_limit::RateLimiter;
use super::service::AuthService;
use super::session::SessionStore;
use super::token::TokenCodec;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// Explicit auth configuration; secrets and TTLs are never read from ambient
/// process state after startup.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_secret: SecretString,
    refresh_token_secret: SecretString,
    access_token_ttl_seconds: u64,
    refresh_token_ttl_seconds: u64,
    frontend_origin: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_frontend_origin(mut self, origin: String) -> Self {
        self.frontend_origin = origin;
        self
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> u64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> u64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn frontend_origin(&self) -> &str {
        &self.frontend_origin
    }

    pub(super) fn codec(&self) -> TokenCodec {
        TokenCodec::new(
            self.access_token_secret.clone(),
            self.refresh_token_secret.clone(),
            self.access_token_ttl_seconds,
            self.refresh_token_ttl_seconds,
        )
    }
}

/// Per-process auth state injected into handlers as an `Extension`.
pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    service: AuthService,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let codec = config.codec();
        let service = AuthService::new(codec.clone(), identities, sessions);

        Self {
            config,
            codec,
            service,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn service(&self) -> &AuthService {
        &self.service
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        &*self.rate_limiter
    }

    pub(crate) fn codec(&self) -> &TokenCodec {
        &self.codec
    }
}
