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
use crate::extract::{validate_body, BodyWithIcon};
use crate::icons::IconKind;
use crate::middleware::auth::require_admin;
use crate::models::author::{self, AuthorPatch, NewAuthor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let open = Router::new()
        .route("/", get(index))
        .route("/authorHandle/:authorHandle", get(show));

    let admin = Router::new()
        .route("/", post(create))
        .route("/:id", patch(update).delete(destroy))
        .route_layer(from_fn(require_admin));

    open.merge(admin)
}

/// POST /authors - add a staff writer, admins only
async fn create(
    State(state): State<AppState>,
    BodyWithIcon(body, upload): BodyWithIcon<NewAuthor>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;

    let icon = match upload {
        Some(upload) => Some(state.icons.store(
            &body.author_handle,
            IconKind::Author,
            &upload.bytes,
        )?),
        None => None,
    };

    let authors = author::create(&state.pool, &body, icon).await?;
    Ok((StatusCode::CREATED, Json(json!({ "authors": authors }))))
}

/// GET /authors - the whole masthead
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let authors = author::find_all(&state.pool).await?;
    Ok(Json(json!({ "authors": authors })))
}

/// GET /authors/authorHandle/:authorHandle - one author by handle
async fn show(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let authors = author::get(&state.pool, &handle).await?;
    Ok(Json(json!({ "authors": authors })))
}

/// PATCH /authors/:id - partial update, admins only. When the handle
/// changes without a new image, the stored icon file is renamed to follow
/// it; a new image is stored under whichever handle will be current.
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    BodyWithIcon(body, upload): BodyWithIcon<AuthorPatch>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;

    let new_handle = body.author_handle.as_deref().filter(|h| !h.is_empty());

    let icon = match upload {
        Some(upload) => {
            let key = match new_handle {
                Some(handle) => handle.to_string(),
                None => author::handle_for(&state.pool, id).await?,
            };
            Some(state.icons.store(&key, IconKind::Author, &upload.bytes)?)
        }
        None => match new_handle {
            Some(handle) => {
                let old_handle = author::handle_for(&state.pool, id).await?;
                if old_handle != handle {
                    Some(state.icons.rename(&old_handle, handle, IconKind::Author))
                } else {
                    None
                }
            }
            None => None,
        },
    };

    let authors = author::update(&state.pool, id, body, icon).await?;
    Ok(Json(json!({ "authors": authors })))
}

/// DELETE /authors/:id - retire an author; their articles stay behind
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let authors = author::delete(&state.pool, id).await?;
    Ok(Json(json!({ "authors": authors })))
}
