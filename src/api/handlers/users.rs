//! User management endpoints.
//!
//! Flow Overview:
//! 1) Gate the request on a valid bearer access token.
//! 2) Perform the requested read or mutation against Postgres.
//! 3) Report outcomes with the same statuses and messages for every caller.
//!
//! These handlers own user provisioning; the auth core only ever reads the
//! rows written here.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{error, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::{identity::Role, message, principal::require_auth, AuthState};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub active: bool,
    /// Ids of the notes assigned to this user.
    pub notes: Vec<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub id: Uuid,
    pub username: String,
    pub password: Option<String>,
    pub role: String,
    pub active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteUserRequest {
    pub id: Uuid,
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users with their note ids", body = [UserSummary]),
        (status = 400, description = "No users found"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    match fetch_user_summaries(&pool).await {
        Ok(users) if users.is_empty() => message(StatusCode::BAD_REQUEST, "No users found"),
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => {
            error!("Failed to list users: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Invalid role name"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 409, description = "Duplicate user name")
    ),
    tag = "users"
)]
pub async fn create_user(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<CreateUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    let request: CreateUserRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let Ok(role) = request.role.parse::<Role>() else {
        return message(StatusCode::BAD_REQUEST, "Invalid role name");
    };

    let password_hash = match hash_password(request.password).await {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    match insert_user(&pool, &request.username, &password_hash, role).await {
        Ok(Some(username)) => message(
            StatusCode::CREATED,
            &format!("New user {username} created"),
        ),
        Ok(None) => message(StatusCode::CONFLICT, "Duplicate user name"),
        Err(err) => {
            error!("Failed to create user: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[utoipa::path(
    patch,
    path = "/users",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated"),
        (status = 400, description = "User not found or invalid role name"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 409, description = "Duplicate user name")
    ),
    tag = "users"
)]
pub async fn update_user(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<UpdateUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    let request: UpdateUserRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let Ok(role) = request.role.parse::<Role>() else {
        return message(StatusCode::BAD_REQUEST, "Invalid role name");
    };

    let password_hash = match request.password {
        Some(password) => match hash_password(password).await {
            Ok(hash) => Some(hash),
            Err(err) => {
                error!("Failed to hash password: {err}");
                return message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            }
        },
        None => None,
    };

    match apply_user_update(&pool, &request.id, &request.username, password_hash, role, request.active)
        .await
    {
        Ok(UpdateOutcome::Updated(username)) => {
            message(StatusCode::OK, &format!("{username} has been updated"))
        }
        Ok(UpdateOutcome::NotFound) => message(StatusCode::BAD_REQUEST, "User not found"),
        Ok(UpdateOutcome::Conflict) => message(StatusCode::CONFLICT, "Duplicate user name"),
        Err(err) => {
            error!("Failed to update user: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[utoipa::path(
    delete,
    path = "/users",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "User not found or has assigned notes"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "users"
)]
pub async fn delete_user(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<DeleteUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    let request: DeleteUserRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    match remove_user(&pool, &request.id).await {
        Ok(DeleteOutcome::Deleted(username)) => {
            message(StatusCode::OK, &format!("{username} has been deleted"))
        }
        Ok(DeleteOutcome::NotFound) => message(StatusCode::BAD_REQUEST, "User not found"),
        Ok(DeleteOutcome::HasNotes) => {
            message(StatusCode::BAD_REQUEST, "User has assigned notes")
        }
        Err(err) => {
            error!("Failed to delete user: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

enum UpdateOutcome {
    Updated(String),
    NotFound,
    Conflict,
}

enum DeleteOutcome {
    Deleted(String),
    NotFound,
    HasNotes,
}

/// Hash a password off the async worker; bcrypt is CPU-bound.
async fn hash_password(password: String) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await??;
    Ok(hash)
}

async fn fetch_user_summaries(pool: &PgPool) -> anyhow::Result<Vec<UserSummary>> {
    let query = r"
        SELECT u.id, u.username, u.role, u.active,
               u.created_at::text AS created_at, u.updated_at::text AS updated_at,
               array_remove(array_agg(n.id), NULL) AS notes
        FROM users u
        LEFT JOIN notes n ON n.user_id = u.id
        GROUP BY u.id
        ORDER BY u.username
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;

    rows.into_iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            let role: String = row.get("role");
            Ok(UserSummary {
                id: id.to_string(),
                username: row.get("username"),
                role: role
                    .parse()
                    .map_err(|err: String| anyhow::anyhow!(err))?,
                active: row.get("active"),
                notes: row.get("notes"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
        })
        .collect()
}

/// Insert a user; `None` signals a username conflict.
async fn insert_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    role: Role,
) -> anyhow::Result<Option<String>> {
    let query = r"
        INSERT INTO users (username, password_hash, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO NOTHING
        RETURNING username
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .bind(password_hash)
        .bind(role.to_string())
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map(|row| row.get("username")))
}

async fn apply_user_update(
    pool: &PgPool,
    id: &Uuid,
    username: &str,
    password_hash: Option<String>,
    role: Role,
    active: bool,
) -> anyhow::Result<UpdateOutcome> {
    let duplicate_query = "SELECT 1 FROM users WHERE username = $1 AND id <> $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = duplicate_query
    );
    let duplicate = sqlx::query(duplicate_query)
        .bind(username)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    if duplicate.is_some() {
        return Ok(UpdateOutcome::Conflict);
    }

    let query = r"
        UPDATE users
        SET username = $2,
            role = $3,
            active = $4,
            password_hash = COALESCE($5, password_hash),
            updated_at = now()
        WHERE id = $1
        RETURNING username
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(username)
        .bind(role.to_string())
        .bind(active)
        .bind(password_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map_or(UpdateOutcome::NotFound, |row| {
        UpdateOutcome::Updated(row.get("username"))
    }))
}

async fn remove_user(pool: &PgPool, id: &Uuid) -> anyhow::Result<DeleteOutcome> {
    let notes_query = "SELECT 1 FROM notes WHERE user_id = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = notes_query
    );
    let has_notes = sqlx::query(notes_query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    if has_notes.is_some() {
        return Ok(DeleteOutcome::HasNotes);
    }

    let query = "DELETE FROM users WHERE id = $1 RETURNING username";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map_or(DeleteOutcome::NotFound, |row| {
        DeleteOutcome::Deleted(row.get("username"))
    }))
}
