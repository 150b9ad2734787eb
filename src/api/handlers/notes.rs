//! Note management endpoints.
//!
//! Same gate-then-mutate shape as the user handlers; notes always belong to a
//! user and block that user's deletion while they exist.

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

use super::auth::{message, principal::require_auth, AuthState};

#[derive(Debug, Serialize, ToSchema)]
pub struct NoteResponse {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub text: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNoteRequest {
    pub title: String,
    pub text: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateNoteRequest {
    pub id: i64,
    pub title: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteNoteRequest {
    pub id: i64,
}

#[utoipa::path(
    get,
    path = "/notes",
    responses(
        (status = 200, description = "All notes", body = [NoteResponse]),
        (status = 400, description = "No notes found"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "notes"
)]
pub async fn list_notes(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    match fetch_notes(&pool).await {
        Ok(notes) if notes.is_empty() => message(StatusCode::BAD_REQUEST, "No notes found"),
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(err) => {
            error!("Failed to list notes: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[utoipa::path(
    post,
    path = "/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created"),
        (status = 400, description = "Invalid note data received"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "notes"
)]
pub async fn create_note(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<CreateNoteRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    let request: CreateNoteRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    match insert_note(&pool, &request).await {
        Ok(Some(title)) => message(StatusCode::CREATED, &format!("New note {title} created")),
        Ok(None) => message(StatusCode::BAD_REQUEST, "Invalid note data received"),
        Err(err) => {
            error!("Failed to create note: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[utoipa::path(
    patch,
    path = "/notes",
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated"),
        (status = 400, description = "Note cannot be found"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "notes"
)]
pub async fn update_note(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<UpdateNoteRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    let request: UpdateNoteRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    match apply_note_update(&pool, &request).await {
        Ok(Some(title)) => message(StatusCode::OK, &format!("{title} has been updated")),
        Ok(None) => message(StatusCode::BAD_REQUEST, "Note cannot be found"),
        Err(err) => {
            error!("Failed to update note: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[utoipa::path(
    delete,
    path = "/notes",
    request_body = DeleteNoteRequest,
    responses(
        (status = 200, description = "Note deleted"),
        (status = 400, description = "Note cannot be found"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "notes"
)]
pub async fn delete_note(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<DeleteNoteRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return message(status, "Unauthorized");
    }

    let request: DeleteNoteRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    match remove_note(&pool, request.id).await {
        Ok(Some(title)) => message(StatusCode::OK, &format!("{title} has been deleted")),
        Ok(None) => message(StatusCode::BAD_REQUEST, "Note cannot be found"),
        Err(err) => {
            error!("Failed to delete note: {err}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

async fn fetch_notes(pool: &PgPool) -> anyhow::Result<Vec<NoteResponse>> {
    let query = r"
        SELECT id, user_id, title, body AS text, completed,
               created_at::text AS created_at, updated_at::text AS updated_at
        FROM notes
        ORDER BY id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let user_id: Uuid = row.get("user_id");
            NoteResponse {
                id: row.get("id"),
                user_id: user_id.to_string(),
                title: row.get("title"),
                text: row.get("text"),
                completed: row.get("completed"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            }
        })
        .collect())
}

/// Insert a note; `None` signals an unknown user id.
async fn insert_note(pool: &PgPool, request: &CreateNoteRequest) -> anyhow::Result<Option<String>> {
    let query = r"
        INSERT INTO notes (user_id, title, body)
        VALUES ($1, $2, $3)
        RETURNING title
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(request.user_id)
        .bind(&request.title)
        .bind(&request.text)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(Some(row.get("title"))),
        Err(err) if is_foreign_key_violation(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn apply_note_update(
    pool: &PgPool,
    request: &UpdateNoteRequest,
) -> anyhow::Result<Option<String>> {
    let query = r"
        UPDATE notes
        SET title = COALESCE($2, title),
            body = COALESCE($3, body),
            completed = COALESCE($4, completed),
            updated_at = now()
        WHERE id = $1
        RETURNING title
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(request.id)
        .bind(&request.title)
        .bind(&request.text)
        .bind(request.completed)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map(|row| row.get("title")))
}

async fn remove_note(pool: &PgPool, id: i64) -> anyhow::Result<Option<String>> {
    let query = "DELETE FROM notes WHERE id = $1 RETURNING title";
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

    Ok(row.map(|row| row.get("title")))
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23503"),
        _ => false,
    }
}
