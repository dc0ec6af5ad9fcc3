use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::create_token;
use crate::error::ApiError;
use crate::extract::{validate_body, BodyWithIcon};
use crate::icons::IconKind;
use crate::middleware::auth::{require_admin, require_owner_or_admin, AuthUser};
use crate::models::user::{self, NewFeedback, NewUser, UserPatch};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let open = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/feedback", post(leave_feedback));

    let admin = Router::new()
        .route("/", post(create).get(index))
        .route_layer(from_fn(require_admin));

    let owner = Router::new()
        .route("/username/:username", get(show))
        .route("/:id", axum::routing::patch(update).delete(destroy))
        .route_layer(from_fn(require_owner_or_admin));

    open.merge(admin).merge(owner)
}

/// POST /users/register - self-service signup; echoes the user and a token
async fn register(
    State(state): State<AppState>,
    BodyWithIcon(body, upload): BodyWithIcon<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;

    let icon = match upload {
        Some(upload) => Some(state.icons.store(&body.username, IconKind::User, &upload.bytes)?),
        None => None,
    };

    let user = user::register(&state.pool, &body, icon).await?;
    let token = create_token(user.id, &user.username, user.is_admin, &state.config.jwt_secret)?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user, "token": token }))))
}

/// POST /users - admin-issued account; same contract as register
async fn create(
    state: State<AppState>,
    body: BodyWithIcon<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    register(state, body).await
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// POST /users/login - credential check; bad pairs are a 401
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user::authenticate(&state.pool, &body.username, &body.password).await?;
    let token = create_token(user.id, &user.username, user.is_admin, &state.config.jwt_secret)?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user, "token": token }))))
}

/// POST /users/feedback - store site feedback from any visitor
async fn leave_feedback(
    State(state): State<AppState>,
    Json(body): Json<NewFeedback>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;
    let feedback = user::feedback(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "feedback": feedback }))))
}

/// GET /users - every account, admins only
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = user::find_all(&state.pool).await?;
    Ok(Json(json!({ "users": users })))
}

/// GET /users/username/:username - one account, owner or admin
async fn show(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let users = user::get(&state.pool, &username).await?;
    Ok(Json(json!({ "users": users })))
}

/// PATCH /users/:id - partial update, owner or admin; returns a fresh token
/// since the username may have changed
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Extension(auth): Extension<AuthUser>,
    BodyWithIcon(mut body, upload): BodyWithIcon<UserPatch>,
) -> Result<impl IntoResponse, ApiError> {
    validate_body(&body)?;

    // The guard strips isAdmin from JSON bodies; multipart bodies reach this
    // point unstripped, so close the same door here.
    if !auth.is_admin {
        body.is_admin = None;
    }

    let icon = match upload {
        Some(upload) => {
            let key = match body.username.as_deref().filter(|name| !name.is_empty()) {
                Some(username) => username.to_string(),
                None => user::username_for(&state.pool, id).await?,
            };
            Some(state.icons.store(&key, IconKind::User, &upload.bytes)?)
        }
        None => None,
    };

    let user = user::update(&state.pool, id, body, icon).await?;
    let token = create_token(user.id, &user.username, user.is_admin, &state.config.jwt_secret)?;
    Ok(Json(json!({ "user": user, "token": token })))
}

/// DELETE /users/:id - remove an account, owner or admin
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let users = user::remove(&state.pool, id).await?;
    Ok(Json(json!({ "users": users })))
}
