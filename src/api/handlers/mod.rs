//! API handlers.
//!
//! `auth` owns the session core (token codec, session slots, orchestrator)
//! and the bearer gate the other handlers call before touching Postgres.

pub mod auth;
pub mod health;
pub mod notes;
pub mod root;
pub mod users;
