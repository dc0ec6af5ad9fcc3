use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::json;

use crate::error::ApiError;
use crate::extract::validate_body;
use crate::middleware::auth::require_admin;
use crate::models::keyword::{self, KeywordEdit, NewKeywords, ALL_ARTICLES_ID};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let open = Router::new().route("/:articleId", get(for_article));

    let admin = Router::new()
        .route("/", post(create).get(index))
        .route("/:articleId", patch(update))
        .route("/:articleId/:keyword", delete(destroy))
        .route_layer(from_fn(require_admin));

    open.merge(admin)
}

/// POST /keywords - tag one article, or every article when articleId is the
/// broadcast sentinel (0 or absent)
async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewKeywords>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;

    let article_id = body.article_id.unwrap_or(ALL_ARTICLES_ID);
    let keywords = if article_id == ALL_ARTICLES_ID {
        keyword::add_to_all_articles(&state.pool, &body.keywords).await?
    } else {
        keyword::add_to_article(&state.pool, article_id, &body.keywords).await?
    };

    Ok((StatusCode::CREATED, Json(json!({ "keywords": keywords }))))
}

/// GET /keywords - every association, admins only
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let keywords = keyword::get_keywords(&state.pool).await?;
    Ok(Json(json!({ "keywords": keywords })))
}

/// GET /keywords/:articleId - the tags on one article
async fn for_article(
    State(state): State<AppState>,
    Path(article_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let keywords = keyword::get_article_keywords(&state.pool, article_id).await?;
    Ok(Json(json!({ "keywords": keywords })))
}

/// PATCH /keywords/:articleId - rename a tag on one article, or everywhere
/// for the broadcast sentinel
async fn update(
    State(state): State<AppState>,
    Path(article_id): Path<i32>,
    Json(body): Json<KeywordEdit>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let keywords = keyword::update_keywords(&state.pool, article_id, &body).await?;
    Ok(Json(json!({ "keywords": keywords })))
}

/// DELETE /keywords/:articleId/:keyword - untag one article, or every
/// article for the broadcast sentinel
async fn destroy(
    State(state): State<AppState>,
    Path((article_id, keyword)): Path<(i32, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let keywords = keyword::delete(&state.pool, article_id, &keyword).await?;
    Ok(Json(json!({ "keywords": keywords })))
}
