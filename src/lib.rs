//! # Notarium
//!
//! `notarium` is a notes and user management API fronted by a JWT-based
//! authentication core.
//!
//! ## Sessions
//!
//! Authentication issues two token classes signed with independent secrets:
//!
//! - **Access tokens** are short-lived (1 hour by default), stateless, and
//!   verified purely by signature and expiry. They are never revoked before
//!   natural expiry.
//! - **Refresh tokens** are longer-lived (24 hours by default) and are only
//!   accepted while they occupy the single per-user session slot. Every
//!   successful refresh rotates both tokens and overwrites the slot, so a
//!   superseded refresh token is rejected even though its signature is valid.
//!
//! Logout clears the session slot for the authenticated user and always
//! reports success to avoid leaking session state.
//!
//! ## Roles
//!
//! Users carry one of a closed set of roles (`EMPLOYEE`, `ADMIN`, `MANAGER`).
//! All `/users` and `/notes` routes require a valid bearer access token.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
