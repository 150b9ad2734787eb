//! Auth orchestrator: login, refresh, and logout over the codec and stores.
//!
//! Flow Overview:
//! 1) Login verifies credentials, issues an access/refresh pair, and
//!    overwrites the user's session slot.
//! 2) Refresh accepts only the single most-recently-issued refresh token,
//!    rotates both tokens, and overwrites the slot. The read-check-write
//!    window is serialized per username so two concurrent refreshes with the
//!    same token cannot both win.
//! 3) Logout clears the slot when the caller's access token verifies, and
//!    reports success either way.

use jsonwebtoken::get_current_timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use super::credentials::verify_credentials;
use super::identity::IdentityStore;
use super::session::SessionStore;
use super::token::TokenCodec;

/// Failures the orchestrator reports to handlers. Messages stay uniform so no
/// response reveals which internal check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, missing/stale refresh token, or unknown principal.
    #[error("Unauthorized")]
    Unauthorized,
    /// Well-formed refresh token with a bad signature or past expiry.
    #[error("Forbidden")]
    Forbidden,
    /// Dependency failure; per-request, never fatal to the process.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Token pair returned by login and refresh.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Issuance time plus the access TTL, computed independently of the
    /// claim so callers never need to decode the token for it.
    pub expires_at: u64,
}

pub struct AuthService {
    codec: TokenCodec,
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        codec: TokenCodec,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            codec,
            identities,
            sessions,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Verify credentials and start a fresh session.
    ///
    /// # Errors
    /// `Unauthorized` for any credential failure, `Internal` for store errors.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let Some(identity) = verify_credentials(&*self.identities, username, password).await?
        else {
            return Err(AuthError::Unauthorized);
        };

        let pair = self.issue_pair(&identity).await?;

        Ok(pair)
    }

    /// Rotate a refresh token into a new access/refresh pair.
    ///
    /// The presented token must byte-for-byte match the user's session slot;
    /// superseded tokens fail here even though their signatures still verify.
    ///
    /// # Errors
    /// `Unauthorized` for missing/stale tokens and unknown users, `Forbidden`
    /// for signature or expiry failures, `Internal` for store errors.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AuthError> {
        if presented.is_empty() {
            return Err(AuthError::Unauthorized);
        }

        let claims = self
            .codec
            .verify_refresh_token(presented)
            .map_err(|_| AuthError::Forbidden)?;

        let lock = self.user_lock(&claims.username).await;
        let guard = lock.lock().await;
        let result = self.rotate(&claims.username, presented).await;
        drop(guard);
        drop(lock);
        self.cleanup_user_lock(&claims.username).await;

        result
    }

    /// Slot check and rotation; callers must hold the user's refresh lock.
    async fn rotate(&self, username: &str, presented: &str) -> Result<TokenPair, AuthError> {
        let stored = self.sessions.get(username).await?;
        if stored.as_deref() != Some(presented) {
            return Err(AuthError::Unauthorized);
        }

        // Re-resolve the user so deleted or deactivated accounts stop
        // refreshing even while their token is otherwise valid.
        match self.identities.find_by_username(username).await? {
            Some(identity) if identity.active => self.issue_pair(&identity).await,
            _ => Err(AuthError::Unauthorized),
        }
    }

    /// Clear the caller's session slot.
    ///
    /// Always succeeds: an absent, invalid, or expired access token just means
    /// there is nothing to invalidate server-side.
    pub async fn logout(&self, access_token: Option<&str>) {
        let Some(token) = access_token else { return };
        let Ok(claims) = self.codec.verify_access_token(token) else {
            return;
        };

        if let Err(err) = self.sessions.delete(&claims.user.username).await {
            warn!(
                "Failed to delete session record for {}: {err}",
                claims.user.username
            );
        }
    }

    async fn issue_pair(
        &self,
        identity: &super::identity::Identity,
    ) -> Result<TokenPair, AuthError> {
        let access_token = self
            .codec
            .issue_access_token(identity)
            .map_err(anyhow::Error::from)?;
        let refresh_token = self
            .codec
            .issue_refresh_token(&identity.username)
            .map_err(anyhow::Error::from)?;

        // Fire-and-forget: a failed session write leaves the new refresh
        // token unusable until the next login, which self-heals.
        if let Err(err) = self.sessions.set(&identity.username, &refresh_token).await {
            warn!(
                "Failed to store session record for {}: {err}",
                identity.username
            );
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: get_current_timestamp() + self.codec.access_ttl_seconds(),
        })
    }

    async fn user_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn cleanup_user_lock(&self, username: &str) {
        let mut locks = self.refresh_locks.lock().await;
        if let Some(entry) = locks.get(username) {
            // Last holder cleans up so the map stays bounded by active users.
            if Arc::strong_count(entry) == 1 {
                locks.remove(username);
            }
        }
    }
}
