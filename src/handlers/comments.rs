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
use crate::middleware::auth::{require_admin, require_login, require_owner_or_admin};
use crate::models::comment::{self, CommentPatch, NewComment};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let open = Router::new()
        .route("/users/:userId", get(by_user))
        .route("/articles/:articleId", get(by_article));

    let logged_in = Router::new()
        .route("/", post(create))
        .route_layer(from_fn(require_login));

    let admin = Router::new()
        .route("/", get(index))
        .route("/:id", get(show))
        .route_layer(from_fn(require_admin));

    let owner = Router::new()
        .route("/:id", patch(update).delete(destroy))
        .route_layer(from_fn(require_owner_or_admin));

    open.merge(logged_in).merge(admin).merge(owner)
}

/// POST /comments - any logged-in user may post
async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewComment>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let comments = comment::create(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "comments": comments }))))
}

/// GET /comments - every comment on the site, admins only
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let comments = comment::get_all(&state.pool).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// GET /comments/:id - one comment, admins only
async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = comment::get(&state.pool, id).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// GET /comments/users/:userId - everything one user said
async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = comment::get_by_user(&state.pool, user_id).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// GET /comments/articles/:articleId - the thread under one article
async fn by_article(
    State(state): State<AppState>,
    Path(article_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = comment::get_by_article(&state.pool, article_id).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// PATCH /comments/:id - edit, owner or admin
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<CommentPatch>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let comments = comment::edit(&state.pool, id, body).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// DELETE /comments/:id - remove, owner or admin
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = comment::delete(&state.pool, id).await?;
    Ok(Json(json!({ "comments": comments })))
}
