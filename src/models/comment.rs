use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{is_foreign_key_violation, ApiError};

use super::{patch_id, patch_or, patch_str};

/// Comment joined with its poster and article. Both joins are nullable: a
/// deleted user or article leaves the comment behind with those fields null.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: i32,
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub user_first: Option<String>,
    pub user_last: Option<String>,
    pub icon: Option<String>,
    pub text: String,
    pub article_id: Option<i32>,
    pub article_title: Option<String>,
    pub post_date: DateTime<Utc>,
}

const COMMENT_SELECT: &str = "SELECT c.id, c.user_id, u.username, u.user_first, u.user_last, \
     u.icon, c.text, c.article_id, a.article_title, c.post_date
     FROM comments c
     LEFT JOIN users u ON u.id = c.user_id
     LEFT JOIN articles a ON a.id = c.article_id";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub user_id: Option<i32>,
    pub article_id: Option<i32>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub text: String,
    pub post_date: Option<DateTime<Utc>>,
}

/// Partial update; omitted fields keep their stored values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    pub user_id: Option<i32>,
    pub article_id: Option<i32>,
    pub text: Option<String>,
    pub post_date: Option<DateTime<Utc>>,
}

/// Insert a new comment. User and article are independently optional and
/// persist as NULL when absent; the post date defaults to now.
pub async fn create(pool: &PgPool, new: &NewComment) -> Result<CommentRecord, ApiError> {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO comments (user_id, article_id, text, post_date)
         VALUES ($1, $2, $3, COALESCE($4, CURRENT_TIMESTAMP))
         RETURNING id",
    )
    .bind(new.user_id)
    .bind(new.article_id)
    .bind(&new.text)
    .bind(new.post_date)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_foreign_key_violation(&err) {
            ApiError::bad_request("No such user or article")
        } else {
            err.into()
        }
    })?;

    fetch(pool, id)
        .await?
        .ok_or_else(|| ApiError::internal("comment vanished between insert and read"))
}

async fn fetch(pool: &PgPool, id: i32) -> Result<Option<CommentRecord>, ApiError> {
    let comment = sqlx::query_as::<_, CommentRecord>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(comment)
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<CommentRecord>, ApiError> {
    let comments =
        sqlx::query_as::<_, CommentRecord>(&format!("{COMMENT_SELECT} ORDER BY c.post_date"))
            .fetch_all(pool)
            .await?;
    Ok(comments)
}

pub async fn get(pool: &PgPool, id: i32) -> Result<CommentRecord, ApiError> {
    fetch(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No comment found by that id: {id}")))
}

pub async fn get_by_user(pool: &PgPool, user_id: i32) -> Result<Vec<CommentRecord>, ApiError> {
    let comments = sqlx::query_as::<_, CommentRecord>(&format!(
        "{COMMENT_SELECT} WHERE c.user_id = $1 ORDER BY c.post_date"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    if comments.is_empty() {
        return Err(ApiError::not_found(format!(
            "No comments associated with that user OR user by that id doesn't exist: {user_id}"
        )));
    }
    Ok(comments)
}

pub async fn get_by_article(pool: &PgPool, article_id: i32) -> Result<Vec<CommentRecord>, ApiError> {
    let comments = sqlx::query_as::<_, CommentRecord>(&format!(
        "{COMMENT_SELECT} WHERE c.article_id = $1 ORDER BY c.post_date"
    ))
    .bind(article_id)
    .fetch_all(pool)
    .await?;

    if comments.is_empty() {
        return Err(ApiError::not_found(format!(
            "No comments associated with that article OR articleId doesn't exist: {article_id}"
        )));
    }
    Ok(comments)
}

/// Fetch-then-write update with the usual falsy fallback per field.
pub async fn edit(pool: &PgPool, id: i32, patch: CommentPatch) -> Result<CommentRecord, ApiError> {
    let existing = sqlx::query_as::<_, ExistingComment>(
        "SELECT user_id, article_id, text, post_date FROM comments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No comment by that id: {id}")))?;

    sqlx::query(
        "UPDATE comments
         SET user_id = $1, article_id = $2, text = $3, post_date = $4
         WHERE id = $5",
    )
    .bind(patch_id(patch.user_id, existing.user_id))
    .bind(patch_id(patch.article_id, existing.article_id))
    .bind(patch_str(patch.text, existing.text))
    .bind(patch_or(patch.post_date, existing.post_date))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|err| {
        if is_foreign_key_violation(&err) {
            ApiError::bad_request("No such user or article")
        } else {
            err.into()
        }
    })?;

    fetch(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No comment by that id: {id}")))
}

/// Delete by id, echoing the row as it stood.
pub async fn delete(pool: &PgPool, id: i32) -> Result<CommentRecord, ApiError> {
    let echo = fetch(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No comment found by id: {id}")))?;

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(echo)
}

#[derive(FromRow)]
struct ExistingComment {
    user_id: Option<i32>,
    article_id: Option<i32>,
    text: String,
    post_date: DateTime<Utc>,
}
