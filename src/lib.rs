//! Tigerlilly backend: a REST API over Postgres for a small online
//! magazine, with JWT sessions and admin/owner route guards.

use axum::{extract::State, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod icons;
pub mod middleware;
pub mod models;
pub mod state;

use error::ApiError;
use state::AppState;

/// Assemble the full router: entity routes, tolerant token resolution on
/// every request, CORS, and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/users", handlers::users::router())
        .nest("/authors", handlers::authors::router())
        .nest("/articles", handlers::articles::router())
        .nest("/issues", handlers::issues::router())
        .nest("/comments", handlers::comments::router())
        .nest("/keywords", handlers::keywords::router())
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate_jwt,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> axum::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::Json(json!({
        "name": "Tigerlilly API",
        "version": version,
        "endpoints": {
            "users": "/users (register, login, feedback, CRUD)",
            "authors": "/authors",
            "articles": "/articles (incl. /articles/search/:terms)",
            "issues": "/issues (incl. /issues/currentIssue)",
            "comments": "/comments",
            "keywords": "/keywords",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Result<axum::Json<Value>, ApiError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(axum::Json(json!({ "status": "ok" })))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}
