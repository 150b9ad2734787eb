//! Token codec: issuing and verifying the two signed token classes.
//!
//! Access and refresh tokens carry different claim sets and are signed with
//! independent secrets, so compromise of one secret never allows forging the
//! other class. Tokens are opaque strings to every other module; only this
//! codec looks inside them.

use jsonwebtoken::{
    decode, encode, get_current_timestamp, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::{Identity, Role};

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed token, or expiry in the past.
    #[error("invalid token")]
    Invalid,
    #[error("failed to sign token")]
    Signing,
}

/// Identity claims embedded in an access token.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccessUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

/// Access tokens are self-contained: signature plus expiry is the whole
/// validity check, nothing is looked up server-side.
#[derive(Serialize, Deserialize, Debug)]
pub struct AccessClaims {
    pub user: AccessUser,
    pub iat: u64,
    pub exp: u64,
}

/// Refresh tokens carry only the username; the session slot check on top of
/// the signature lives in the orchestrator.
#[derive(Serialize, Deserialize, Debug)]
pub struct RefreshClaims {
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Clone)]
pub struct TokenCodec {
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(
        access_secret: SecretString,
        refresh_secret: SecretString,
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
    ) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl_seconds
    }

    /// Issue an access token for a verified identity.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_access_token(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_access_token_at(identity, get_current_timestamp())
    }

    /// Issue a refresh token bound to a username.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_refresh_token(&self, username: &str) -> Result<String, TokenError> {
        self.issue_refresh_token_at(username, get_current_timestamp())
    }

    /// Verify signature and expiry against the access secret.
    ///
    /// # Errors
    /// Returns `TokenError::Invalid` on any verification failure; the cause is
    /// deliberately not distinguished.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.access_secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| TokenError::Invalid)
    }

    /// Verify signature and expiry against the refresh secret.
    ///
    /// # Errors
    /// Returns `TokenError::Invalid` on any verification failure.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| TokenError::Invalid)
    }

    pub(super) fn issue_access_token_at(
        &self,
        identity: &Identity,
        now: u64,
    ) -> Result<String, TokenError> {
        let claims = AccessClaims {
            user: AccessUser {
                id: identity.id.to_string(),
                username: identity.username.clone(),
                role: identity.role,
            },
            iat: now,
            exp: now + self.access_ttl_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.access_secret.expose_secret().as_bytes()),
        )
        .map_err(|_| TokenError::Signing)
    }

    pub(super) fn issue_refresh_token_at(
        &self,
        username: &str,
        now: u64,
    ) -> Result<String, TokenError> {
        let claims = RefreshClaims {
            username: username.to_string(),
            iat: now,
            exp: now + self.refresh_ttl_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.expose_secret().as_bytes()),
        )
        .map_err(|_| TokenError::Signing)
    }
}
