use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;

use crate::error::ApiError;
use crate::extract::validate_body;
use crate::middleware::auth::require_admin;
use crate::models::issue::{self, IssuePatch, NewIssue};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let open = Router::new()
        .route("/", get(index))
        .route("/currentIssue", get(current))
        .route("/:id", get(show))
        .route("/issueTitle/:issueTitle", get(show_by_title));

    let admin = Router::new()
        .route("/", post(create))
        .route("/:id", patch(update).delete(destroy))
        .route_layer(from_fn(require_admin));

    open.merge(admin)
}

/// POST /issues - open a new issue, admins only
async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewIssue>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let issues = issue::create(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "issues": issues }))))
}

/// GET /issues - every issue, newest content elsewhere; this is the index
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let issues = issue::get_all(&state.pool).await?;
    Ok(Json(json!({ "issues": issues })))
}

/// GET /issues/currentIssue - the most recently published issue with its
/// articles and authors
async fn current(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let issues = issue::get_current(&state.pool).await?;
    Ok(Json(json!({ "issues": issues })))
}

/// GET /issues/:id - one issue with its articles and authors
async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let issues = issue::get(&state.pool, id).await?;
    Ok(Json(json!({ "issues": issues })))
}

/// GET /issues/issueTitle/:issueTitle
async fn show_by_title(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let issues = issue::get_by_title(&state.pool, &title).await?;
    Ok(Json(json!({ "issues": issues })))
}

/// PATCH /issues/:id - partial update, admins only
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<IssuePatch>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let issues = issue::update(&state.pool, id, body).await?;
    Ok(Json(json!({ "issues": issues })))
}

/// DELETE /issues/:id - drop an issue; its articles stay, unassigned
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let issues = issue::delete(&state.pool, id).await?;
    Ok(Json(json!({ "issues": issues })))
}
