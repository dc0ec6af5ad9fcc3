use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{is_unique_violation, ApiError};

use super::{patch_flag, patch_str};

/// Public projection of a user row. The password hash never leaves this
/// module.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub user_first: String,
    pub user_last: String,
    pub email: String,
    pub is_admin: bool,
    pub icon: String,
}

const USER_COLUMNS: &str = "id, username, user_first, user_last, email, is_admin, icon";

/// Full row, fetched only inside this module.
#[derive(FromRow)]
struct UserRow {
    id: i32,
    username: String,
    password: String,
    user_first: String,
    user_last: String,
    email: String,
    is_admin: bool,
    icon: String,
}

/// Registration payload (`POST /users`, `POST /users/register`).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(length(min = 1, max = 30, message = "must be 1 to 30 characters"))]
    pub username: String,
    #[validate(length(min = 5, message = "must be at least 5 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 30, message = "must be 1 to 30 characters"))]
    pub user_first: String,
    #[validate(length(min = 1, max = 30, message = "must be 1 to 30 characters"))]
    pub user_last: String,
    #[validate(email(message = "is not a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Partial update payload (`PATCH /users/:id`). Omitted fields keep their
/// stored values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub username: Option<String>,
    pub password: Option<String>,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub user_first: Option<String>,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub user_last: Option<String>,
    #[validate(email(message = "is not a valid email address"))]
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

/// Site feedback (`POST /users/feedback`); stored, never read back by the API.
#[derive(Debug, Deserialize, Validate)]
pub struct NewFeedback {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "is not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub feedback: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct FeedbackRecord {
    pub name: String,
    pub email: String,
    pub feedback: String,
}

/// Check a username/password pair. Wrong username and wrong password are
/// indistinguishable to the caller.
pub async fn authenticate(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<UserRecord, ApiError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password, user_first, user_last, email, is_admin, icon
         FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        if verify_password(password, &row.password)? {
            return Ok(UserRecord {
                id: row.id,
                username: row.username,
                user_first: row.user_first,
                user_last: row.user_last,
                email: row.email,
                is_admin: row.is_admin,
                icon: row.icon,
            });
        }
    }

    Err(ApiError::Unauthorized(
        "Invalid username/password".to_string(),
    ))
}

/// Insert a new user. Username and email must both be unique; the hash is
/// computed here so plaintext never reaches the insert.
pub async fn register(
    pool: &PgPool,
    new: &NewUser,
    icon: Option<String>,
) -> Result<UserRecord, ApiError> {
    let clash: Option<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = $1 OR email = $2")
            .bind(&new.username)
            .bind(&new.email)
            .fetch_optional(pool)
            .await?;

    if let Some((username, email)) = clash {
        if username == new.username {
            return Err(ApiError::conflict(format!("Duplicate username: {username}")));
        }
        return Err(ApiError::conflict(format!("Duplicate email: {email}")));
    }

    let hashed = hash_password(&new.password)?;

    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "INSERT INTO users (username, password, user_first, user_last, email, icon, is_admin)
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'defaultUserIcon.jpeg'), $7)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&new.username)
    .bind(&hashed)
    .bind(&new.user_first)
    .bind(&new.user_last)
    .bind(&new.email)
    .bind(icon)
    .bind(new.is_admin)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<UserRecord>, ApiError> {
    let users = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY LOWER(username)"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn get(pool: &PgPool, username: &str) -> Result<UserRecord, ApiError> {
    sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No user: {username}")))
}

/// Username for an id; used to key icon files when a PATCH carries an image
/// but no username change.
pub async fn username_for(pool: &PgPool, id: i32) -> Result<String, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|(username,)| username)
        .ok_or_else(|| ApiError::not_found(format!("No user found by that id: {id}")))
}

/// Fetch-then-write update. Each field falls back to its stored value when
/// the patch leaves it out (or clears it to a falsy value); the password is
/// only replaced when a new plaintext one is supplied.
pub async fn update(
    pool: &PgPool,
    id: i32,
    patch: UserPatch,
    icon: Option<String>,
) -> Result<UserRecord, ApiError> {
    let existing = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password, user_first, user_last, email, is_admin, icon
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No user found by that id: {id}")))?;

    let password = match patch.password.as_deref() {
        Some(plain) if !plain.is_empty() => hash_password(plain)?,
        _ => existing.password,
    };

    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "UPDATE users
         SET user_first = $1, user_last = $2, email = $3, username = $4,
             password = $5, icon = $6, is_admin = $7
         WHERE id = $8
         RETURNING {USER_COLUMNS}"
    ))
    .bind(patch_str(patch.user_first, existing.user_first))
    .bind(patch_str(patch.user_last, existing.user_last))
    .bind(patch_str(patch.email, existing.email))
    .bind(patch_str(patch.username, existing.username))
    .bind(password)
    .bind(patch_str(icon, existing.icon))
    .bind(patch_flag(patch.is_admin, existing.is_admin))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("Duplicate username or email")
        } else {
            err.into()
        }
    })?;

    Ok(user)
}

/// What a deleted user looked like, echoed back to the caller.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeletedUser {
    pub username: String,
    pub user_first: String,
    pub user_last: String,
}

/// Delete by id. Comments by the user survive with their user reference
/// nulled (FK action).
pub async fn remove(pool: &PgPool, id: i32) -> Result<DeletedUser, ApiError> {
    sqlx::query_as::<_, DeletedUser>(
        "DELETE FROM users WHERE id = $1 RETURNING username, user_first, user_last",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No user by that id: {id}")))
}

pub async fn feedback(pool: &PgPool, new: &NewFeedback) -> Result<FeedbackRecord, ApiError> {
    let stored = sqlx::query_as::<_, FeedbackRecord>(
        "INSERT INTO feedback (name, email, feedback)
         VALUES ($1, $2, $3)
         RETURNING name, email, feedback",
    )
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.feedback)
    .fetch_one(pool)
    .await?;
    Ok(stored)
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {err}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| ApiError::internal(format!("Invalid stored password hash: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
