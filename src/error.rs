// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Typed request failure, mapped onto the wire envelope
/// `{"error": {"message": ..., "status": ...}}` by the `IntoResponse` impl.
///
/// Repository functions return these instead of bubbling raw database
/// errors; the route layer only translates them.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    /// Schema-violation messages, one per failed field check. Serialized as
    /// an array so clients can show every problem at once.
    Validation(Vec<String>),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (duplicate unique key, named after the offending value)
    Conflict(String),

    // 500 Internal Server Error
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Validation(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Internal(_) => 500,
        }
    }

    /// Message as it appears under `error.message`: a plain string, or an
    /// array of strings for validation failures.
    fn message_value(&self) -> Value {
        match self {
            ApiError::Validation(messages) => json!(messages),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => json!(msg),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation(messages: Vec<String>) -> Self {
        ApiError::Validation(messages)
    }

    /// The guards reject with the bare default, like the old middleware did.
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

/// True when the database rejected a statement over a unique constraint,
/// e.g. inserting a duplicate (article_id, keyword) pair.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// True when a referenced row does not exist (bad `userId`/`articleId`).
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // Don't expose internal SQL errors to clients
        tracing::error!("database error: {}", err);
        ApiError::internal("An error occurred while processing your request")
    }
}

impl From<crate::icons::IconError> for ApiError {
    fn from(err: crate::icons::IconError) -> Self {
        match err {
            crate::icons::IconError::Decode(_) => ApiError::bad_request(err.to_string()),
            crate::icons::IconError::Io(io_err) => {
                tracing::error!("icon storage error: {}", io_err);
                ApiError::internal("Could not store uploaded icon")
            }
        }
    }
}

impl From<crate::auth::TokenError> for ApiError {
    fn from(err: crate::auth::TokenError) -> Self {
        tracing::error!("token generation error: {}", err);
        ApiError::internal("Could not issue session token")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(messages) => write!(f, "{}", messages.join("; ")),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": {
                "message": self.message_value(),
                "status": self.status_code(),
            }
        });
        (status, Json(body)).into_response()
    }
}
