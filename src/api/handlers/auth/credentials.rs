//! Credential verification against the identity store.

use anyhow::Result;
use tracing::warn;

use super::identity::{Identity, IdentityStore};

/// Hash compared against when the user is unknown or inactive, so the
/// wrong-password and no-such-user paths cost the same.
const DUMMY_HASH: &str = "$2b$12$EXRkfkdmXn2gzds2SSitu.MW9.gAVqa9eLS1//RYtYCmB1eLsg.9q";

/// Check a username/password pair against the stored identity.
///
/// Returns the matching identity on success. Unknown users, deactivated users,
/// and wrong passwords are all reported as `None`; callers must not
/// distinguish them.
///
/// # Errors
/// Only store failures propagate; verification failures do not.
pub(super) async fn verify_credentials(
    identities: &dyn IdentityStore,
    username: &str,
    password: &str,
) -> Result<Option<Identity>> {
    if username.is_empty() || password.is_empty() {
        return Ok(None);
    }

    let Some(identity) = identities.find_by_username(username).await? else {
        burn_verification(password).await?;
        return Ok(None);
    };

    if !identity.active {
        burn_verification(password).await?;
        return Ok(None);
    }

    match compare(password, &identity.password_hash).await? {
        Ok(true) => Ok(Some(identity)),
        Ok(false) => Ok(None),
        Err(err) => {
            // A stored hash bcrypt cannot parse is a data problem, but to the
            // caller it is still just a failed login.
            warn!("Failed to verify password hash for {username}: {err}");
            Ok(None)
        }
    }
}

/// Run the bcrypt comparison off the async worker; it is CPU-bound.
async fn compare(
    password: &str,
    hash: &str,
) -> Result<std::result::Result<bool, bcrypt::BcryptError>> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(anyhow::Error::from)
}

async fn burn_verification(password: &str) -> Result<()> {
    let _ = compare(password, DUMMY_HASH).await?;
    Ok(())
}
