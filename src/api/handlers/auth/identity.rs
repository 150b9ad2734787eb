//! Identity store access for the auth core.
//!
//! The auth core only ever reads identities; provisioning and mutation happen
//! through the `/users` handlers. The store is injected as a trait object so
//! the orchestrator can be exercised with a stand-in during tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::fmt;
use std::str::FromStr;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed set of user roles, stored as text in the database.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Employee,
    Admin,
    Manager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Employee => write!(f, "EMPLOYEE"),
            Role::Admin => write!(f, "ADMIN"),
            Role::Manager => write!(f, "MANAGER"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMPLOYEE" => Ok(Role::Employee),
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A stored user identity as the auth core sees it.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exact, case-sensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>>;
}

/// Postgres-backed identity store.
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let query = "SELECT id, username, password_hash, role, active FROM users WHERE username = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by username")?;

        row.map(|row| {
            let role: String = row.get("role");
            Ok(Identity {
                id: row.get("id"),
                username: row.get("username"),
                password_hash: row.get("password_hash"),
                role: role
                    .parse()
                    .map_err(|err: String| anyhow::anyhow!(err))
                    .context("user row carries an unknown role")?,
                active: row.get("active"),
            })
        })
        .transpose()
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::{Identity, IdentityStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// In-memory stand-in for the Postgres identity store.
    #[derive(Default)]
    pub struct MemoryIdentityStore {
        users: RwLock<HashMap<String, Identity>>,
    }

    impl MemoryIdentityStore {
        pub async fn insert(&self, identity: Identity) {
            self.users
                .write()
                .await
                .insert(identity.username.clone(), identity);
        }

        pub async fn remove(&self, username: &str) {
            self.users.write().await.remove(username);
        }

        pub async fn set_active(&self, username: &str, active: bool) {
            if let Some(identity) = self.users.write().await.get_mut(username) {
                identity.active = active;
            }
        }
    }

    #[async_trait]
    impl IdentityStore for MemoryIdentityStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<Identity>> {
            Ok(self.users.read().await.get(username).cloned())
        }
    }
}
