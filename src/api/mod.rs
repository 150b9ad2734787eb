//! HTTP server wiring: pool, router, middleware layers, and shutdown.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

use handlers::auth::{
    identity::PgIdentityStore, rate_limit::NoopRateLimiter, session::MemorySessionStore,
    AuthConfig, AuthState,
};

/// Build the application router.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(openapi::serve))
        .route("/auth", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/users",
            get(handlers::users::list_users)
                .post(handlers::users::create_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/notes",
            get(handlers::notes::list_notes)
                .post(handlers::notes::create_note)
                .patch(handlers::notes::update_note)
                .delete(handlers::notes::delete_note),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, auth_config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
        auth_config.refresh_token_ttl_seconds(),
    )));
    let frontend_origin = frontend_origin(auth_config.frontend_origin())?;
    let auth_state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(PgIdentityStore::new(pool.clone())),
        sessions,
        Arc::new(NoopRateLimiter),
    ));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(auth_state))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(origin: &str) -> Result<HeaderValue> {
    let trimmed = origin.trim_end_matches('/');
    HeaderValue::from_str(trimmed)
        .with_context(|| format!("Invalid frontend origin: {origin}"))
}

/// Resolve on SIGINT or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install SIGINT handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!("Failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_trailing_slash() -> Result<()> {
        let value = frontend_origin("https://notes.example.com/")?;
        assert_eq!(value, HeaderValue::from_static("https://notes.example.com"));
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_invalid_header_values() {
        assert!(frontend_origin("bad\norigin").is_err());
    }
}
