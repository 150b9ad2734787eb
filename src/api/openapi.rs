//! `OpenAPI` document for the HTTP surface.

use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use super::handlers::{auth, health, notes, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::refresh,
        auth::logout,
        users::list_users,
        users::create_user,
        users::update_user,
        users::delete_user,
        notes::list_notes,
        notes::create_note,
        notes::update_note,
        notes::delete_note,
    ),
    components(schemas(
        auth::types::LoginRequest,
        auth::types::RefreshRequest,
        auth::types::TokenPairResponse,
        auth::types::MessageResponse,
        auth::identity::Role,
        users::UserSummary,
        users::CreateUserRequest,
        users::UpdateUserRequest,
        users::DeleteUserRequest,
        notes::NoteResponse,
        notes::CreateNoteRequest,
        notes::UpdateNoteRequest,
        notes::DeleteNoteRequest,
    )),
    tags(
        (name = "auth", description = "Login, refresh-token rotation, and logout"),
        (name = "users", description = "User provisioning and management"),
        (name = "notes", description = "Note management"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Serve the generated document as JSON.
pub async fn serve() -> impl IntoResponse {
    Json(openapi())
}
