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
use crate::models::{article, article::ArticlePatch, article::NewArticle, keyword};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let open = Router::new()
        .route("/:id", get(show))
        .route("/articleTitle/:articleTitle", get(show_by_title))
        .route("/authors/:handle", get(by_author))
        .route("/keywords/:keyword", get(by_keyword))
        .route("/search/:terms", get(search));

    let admin = Router::new()
        .route("/", post(create).get(index))
        .route("/:id", patch(update).delete(destroy))
        .route_layer(from_fn(require_admin));

    open.merge(admin)
}

/// POST /articles - publish a story, admins only
async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewArticle>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let articles = article::create(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "articles": articles }))))
}

/// GET /articles - the full archive, admins only
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let articles = article::get_all(&state.pool).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /articles/:id
async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = article::get(&state.pool, id).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /articles/articleTitle/:articleTitle
async fn show_by_title(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = article::get_by_title(&state.pool, &title).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /articles/authors/:handle - everything one author wrote
async fn by_author(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = article::fetch_by_author(&state.pool, &handle).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /articles/keywords/:keyword - everything tagged with one keyword
async fn by_keyword(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = article::fetch_by_keyword(&state.pool, &keyword).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /articles/search/:terms - free-text and tag search.
///
/// Terms are comma-separated. A term starting with `*` is looked up in the
/// keyword table; everything else is substring-matched against title and
/// body. The hit sets union into one deduplicated result list.
async fn search(
    State(state): State<AppState>,
    Path(terms): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (tags, words): (Vec<String>, Vec<String>) = terms
        .split(',')
        .map(str::to_string)
        .partition(|term| term.trim_start().starts_with('*'));

    let mut ids = article::search(&state.pool, &words).await?;
    ids.extend(keyword::search(&state.pool, &tags).await?);

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        results.push(article::get(&state.pool, id).await?);
    }

    Ok(Json(json!({ "results": results })))
}

/// PATCH /articles/:id - partial update, admins only
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<ArticlePatch>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let articles = article::update(&state.pool, id, body).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// DELETE /articles/:id - pull a story; its tags go with it
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = article::delete(&state.pool, id).await?;
    Ok(Json(json!({ "articles": articles })))
}
