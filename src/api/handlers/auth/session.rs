//! Single-slot session store: one currently-valid refresh token per user.
//!
//! The store is a thin typed accessor over a volatile key-value collaborator;
//! writes are unconditional (last writer wins) and absence is a normal
//! outcome. There is no transactional coupling with the identity store: a
//! crash between credential verification and the session write only costs the
//! user a fresh login.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current refresh token for the user, if any.
    async fn get(&self, username: &str) -> Result<Option<String>>;

    /// Unconditionally overwrite the user's slot.
    async fn set(&self, username: &str, token: &str) -> Result<()>;

    /// Remove the user's slot; removing an absent slot is not an error.
    async fn delete(&self, username: &str) -> Result<()>;
}

/// In-process session store.
///
/// Entries expire after the configured TTL as hygiene; correctness does not
/// depend on it since the token's own expiry already bounds validity. A
/// network-backed key-value store slots in behind the same trait.
pub struct MemorySessionStore {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

struct Entry {
    token: String,
    expires_at: Instant,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, username: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;
        match entries.get(username) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.token.clone())),
            Some(_) => {
                entries.remove(username);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, username: &str, token: &str) -> Result<()> {
        self.entries.write().await.insert(
            username.to_string(),
            Entry {
                token: token.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<()> {
        self.entries.write().await.remove(username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn get_returns_absent_for_unknown_user() -> Result<()> {
        assert_eq!(store().get("alice").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn set_overwrites_previous_slot() -> Result<()> {
        let store = store();
        store.set("alice", "first").await?;
        store.set("alice", "second").await?;

        assert_eq!(store.get("alice").await?.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_clears_the_slot() -> Result<()> {
        let store = store();
        store.set("alice", "token").await?;
        store.delete("alice").await?;

        assert_eq!(store.get("alice").await?, None);

        // Deleting again is a no-op, not an error.
        store.delete("alice").await?;
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() -> Result<()> {
        let store = MemorySessionStore::new(Duration::from_secs(0));
        store.set("alice", "token").await?;

        assert_eq!(store.get("alice").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn slots_are_per_user() -> Result<()> {
        let store = store();
        store.set("alice", "a-token").await?;
        store.set("bob", "b-token").await?;

        assert_eq!(store.get("alice").await?.as_deref(), Some("a-token"));
        assert_eq!(store.get("bob").await?.as_deref(), Some("b-token"));
        Ok(())
    }
}
