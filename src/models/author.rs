use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{is_unique_violation, ApiError};

use super::{patch_str, teaser};

/// Author projection used by every read and echo shape. `author` is the
/// derived display name, concatenated in SQL.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRecord {
    pub id: i32,
    pub author: String,
    pub author_first: String,
    pub author_last: String,
    pub author_handle: String,
    pub author_slogan: Option<String>,
    pub author_bio: String,
    pub icon: String,
}

impl AuthorRecord {
    /// Read shaping: long bios come back as a teaser.
    fn shaped(mut self) -> Self {
        self.author_bio = teaser(&self.author_bio);
        self
    }
}

const AUTHOR_COLUMNS: &str = "id, CONCAT(author_first, ' ', author_last) AS author, \
     author_first, author_last, author_handle, author_slogan, author_bio, icon";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthor {
    #[validate(length(min = 1, max = 30, message = "must be 1 to 30 characters"))]
    pub author_first: String,
    #[validate(length(min = 1, max = 30, message = "must be 1 to 30 characters"))]
    pub author_last: String,
    #[validate(length(min = 1, max = 30, message = "must be 1 to 30 characters"))]
    pub author_handle: String,
    pub author_slogan: Option<String>,
    pub author_bio: Option<String>,
}

/// Partial update; omitted fields keep their stored values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthorPatch {
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub author_first: Option<String>,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub author_last: Option<String>,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub author_handle: Option<String>,
    pub author_slogan: Option<String>,
    pub author_bio: Option<String>,
}

/// Insert a new author; the handle must be unique.
pub async fn create(
    pool: &PgPool,
    new: &NewAuthor,
    icon: Option<String>,
) -> Result<AuthorRecord, ApiError> {
    let clash: Option<(String,)> =
        sqlx::query_as("SELECT author_handle FROM authors WHERE author_handle = $1")
            .bind(&new.author_handle)
            .fetch_optional(pool)
            .await?;

    if clash.is_some() {
        return Err(ApiError::conflict(format!(
            "Duplicate author handle: {}",
            new.author_handle
        )));
    }

    let author = sqlx::query_as::<_, AuthorRecord>(&format!(
        "INSERT INTO authors (author_first, author_last, author_handle, author_slogan, author_bio, icon)
         VALUES ($1, $2, $3, $4,
                 COALESCE($5, 'This author prefers to keep an air of mystery about them.'),
                 COALESCE($6, 'defaultAuthorIcon.jpeg'))
         RETURNING {AUTHOR_COLUMNS}"
    ))
    .bind(&new.author_first)
    .bind(&new.author_last)
    .bind(&new.author_handle)
    .bind(&new.author_slogan)
    .bind(&new.author_bio)
    .bind(icon)
    .fetch_one(pool)
    .await?;

    Ok(author)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<AuthorRecord>, ApiError> {
    let authors = sqlx::query_as::<_, AuthorRecord>(&format!(
        "SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY LOWER(author_last)"
    ))
    .fetch_all(pool)
    .await?;
    Ok(authors.into_iter().map(AuthorRecord::shaped).collect())
}

pub async fn get(pool: &PgPool, handle: &str) -> Result<AuthorRecord, ApiError> {
    sqlx::query_as::<_, AuthorRecord>(&format!(
        "SELECT {AUTHOR_COLUMNS} FROM authors WHERE author_handle = $1"
    ))
    .bind(handle)
    .fetch_optional(pool)
    .await?
    .map(AuthorRecord::shaped)
    .ok_or_else(|| ApiError::not_found(format!("No author by that handle: {handle}")))
}

/// Handle for an id; used by the route layer to key icon files before the
/// row itself changes.
pub async fn handle_for(pool: &PgPool, id: i32) -> Result<String, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT author_handle FROM authors WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|(handle,)| handle)
        .ok_or_else(|| ApiError::not_found(format!("No author by that id: {id}")))
}

/// Fetch-then-write update with the usual falsy fallback per field.
pub async fn update(
    pool: &PgPool,
    id: i32,
    patch: AuthorPatch,
    icon: Option<String>,
) -> Result<AuthorRecord, ApiError> {
    let existing = sqlx::query_as::<_, ExistingAuthor>(
        "SELECT author_first, author_last, author_handle, author_slogan, author_bio, icon
         FROM authors WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No author by that id: {id}")))?;

    let slogan = match patch.author_slogan {
        Some(value) if !value.is_empty() => Some(value),
        _ => existing.author_slogan,
    };

    let author = sqlx::query_as::<_, AuthorRecord>(&format!(
        "UPDATE authors
         SET author_first = $1, author_last = $2, author_handle = $3,
             author_slogan = $4, author_bio = $5, icon = $6
         WHERE id = $7
         RETURNING {AUTHOR_COLUMNS}"
    ))
    .bind(patch_str(patch.author_first, existing.author_first))
    .bind(patch_str(patch.author_last, existing.author_last))
    .bind(patch_str(patch.author_handle, existing.author_handle))
    .bind(slogan)
    .bind(patch_str(patch.author_bio, existing.author_bio))
    .bind(patch_str(icon, existing.icon))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("Duplicate author handle")
        } else {
            err.into()
        }
    })?;

    Ok(author.shaped())
}

/// Delete by id. Articles by the author survive with their author reference
/// nulled (FK action); the echo is the row as it stood.
pub async fn delete(pool: &PgPool, id: i32) -> Result<AuthorRecord, ApiError> {
    sqlx::query_as::<_, AuthorRecord>(&format!(
        "DELETE FROM authors WHERE id = $1 RETURNING {AUTHOR_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(AuthorRecord::shaped)
    .ok_or_else(|| ApiError::not_found(format!("No author found by that id: {id}")))
}

#[derive(FromRow)]
struct ExistingAuthor {
    author_first: String,
    author_last: String,
    author_handle: String,
    author_slogan: Option<String>,
    author_bio: String,
    icon: String,
}
