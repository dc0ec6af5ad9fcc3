use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::state::AppState;

/// Bodies buffered for the isAdmin strip are capped here; uploads never pass
/// through this path (multipart is skipped).
const STRIP_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Identity resolved from a bearer token, stashed in request extensions for
/// the guards and handlers downstream.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}

/// Resolve `Authorization: Bearer <token>` into an [`AuthUser`] when the
/// signature checks out. A missing, malformed, or forged token is not an
/// error here: most routes are public, and the guards below decide what
/// identity a route actually requires.
pub async fn authenticate_jwt(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = resolve_identity(request.headers(), &state.config.jwt_secret) {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

fn resolve_identity(headers: &HeaderMap, secret: &str) -> Option<AuthUser> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    auth::verify_token(token, secret).ok().map(AuthUser::from)
}

/// Guard: any authenticated identity.
pub async fn require_login(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<AuthUser>().is_none() {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(request).await)
}

/// Guard: an authenticated admin.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin => Ok(next.run(request).await),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Guard: the identity named by the `:username` or `:id` route parameter, or
/// any admin. Before a non-admin owner reaches the handler, a truthy
/// `isAdmin` field is dropped from their JSON body so a self-service update
/// cannot grant the caller admin rights.
pub async fn require_owner_or_admin(
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(ApiError::unauthorized)?;

    if user.is_admin {
        return Ok(next.run(request).await);
    }

    let owns = params
        .get("username")
        .is_some_and(|name| *name == user.username)
        || params
            .get("id")
            .and_then(|raw| raw.parse::<i32>().ok())
            .is_some_and(|id| id == user.id);

    if !owns {
        return Err(ApiError::unauthorized());
    }

    let request = strip_admin_flag(request).await?;
    Ok(next.run(request).await)
}

/// Remove `isAdmin: true` from a JSON body. Multipart bodies pass through
/// untouched; their admin flag is re-checked at the handler.
async fn strip_admin_flag(request: Request) -> Result<Request, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if !is_json {
        return Ok(request);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, STRIP_BODY_LIMIT)
        .await
        .map_err(|_| ApiError::bad_request("could not read request body"))?;

    let bytes = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut map))
            if map.get("isAdmin").and_then(Value::as_bool) == Some(true) =>
        {
            map.remove("isAdmin");
            serde_json::to_vec(&Value::Object(map))
                .map_err(|_| ApiError::internal("could not rewrite request body"))?
                .into()
        }
        _ => bytes,
    };

    parts
        .headers
        .insert(header::CONTENT_LENGTH, bytes.len().into());
    Ok(Request::from_parts(parts, Body::from(bytes)))
}
