use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{is_unique_violation, ApiError};

use super::{patch_int, patch_or, patch_str, teaser};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id: i32,
    pub issue_title: String,
    pub volume: i32,
    pub issue: i32,
    pub pub_date: DateTime<Utc>,
}

/// One row per article in an issue, as produced by the detail queries. An
/// issue with no articles yields a single row with the article fields null.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IssueArticle {
    pub issue_title: String,
    pub volume: i32,
    pub issue: i32,
    pub pub_date: DateTime<Utc>,
    pub article_id: Option<i32>,
    pub article_title: Option<String>,
    pub text: Option<String>,
    pub author_first: Option<String>,
    pub author_last: Option<String>,
    pub author_handle: Option<String>,
}

impl IssueArticle {
    fn shaped(mut self) -> Self {
        self.text = self.text.as_deref().map(teaser);
        self
    }
}

const ISSUE_COLUMNS: &str = "id, issue_title, volume, issue, pub_date";

const ISSUE_DETAIL_SELECT: &str = "SELECT i.issue_title, i.volume, i.issue, i.pub_date, \
     a.id AS article_id, a.article_title, a.text, \
     au.author_first, au.author_last, au.author_handle
     FROM issues i
     LEFT JOIN articles a ON i.id = a.issue_id
     LEFT JOIN authors au ON a.author_id = au.id";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub issue_title: String,
    #[validate(range(min = 1, message = "must be positive"))]
    pub volume: Option<i32>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub issue: Option<i32>,
    pub pub_date: Option<DateTime<Utc>>,
}

/// Partial update; omitted fields keep their stored values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssuePatch {
    pub issue_title: Option<String>,
    pub volume: Option<i32>,
    pub issue: Option<i32>,
    pub pub_date: Option<DateTime<Utc>>,
}

/// Insert a new issue; the title must be unique and the publication date
/// defaults to now.
pub async fn create(pool: &PgPool, new: &NewIssue) -> Result<IssueRecord, ApiError> {
    let clash: Option<(i32,)> = sqlx::query_as("SELECT id FROM issues WHERE issue_title = $1")
        .bind(&new.issue_title)
        .fetch_optional(pool)
        .await?;

    if clash.is_some() {
        return Err(ApiError::conflict(format!(
            "Duplicate issue title: {}",
            new.issue_title
        )));
    }

    let issue = sqlx::query_as::<_, IssueRecord>(&format!(
        "INSERT INTO issues (issue_title, volume, issue, pub_date)
         VALUES ($1, COALESCE($2, 1), COALESCE($3, 1), COALESCE($4, CURRENT_TIMESTAMP))
         RETURNING {ISSUE_COLUMNS}"
    ))
    .bind(&new.issue_title)
    .bind(new.volume)
    .bind(new.issue)
    .bind(new.pub_date)
    .fetch_one(pool)
    .await?;

    Ok(issue)
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<IssueRecord>, ApiError> {
    let issues = sqlx::query_as::<_, IssueRecord>(&format!(
        "SELECT {ISSUE_COLUMNS} FROM issues ORDER BY LOWER(issue_title)"
    ))
    .fetch_all(pool)
    .await?;
    Ok(issues)
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Vec<IssueArticle>, ApiError> {
    let rows = sqlx::query_as::<_, IssueArticle>(&format!("{ISSUE_DETAIL_SELECT} WHERE i.id = $1"))
        .bind(id)
        .fetch_all(pool)
        .await?;

    if rows.is_empty() {
        return Err(ApiError::not_found(format!("No issue by that id: {id}")));
    }
    Ok(rows.into_iter().map(IssueArticle::shaped).collect())
}

pub async fn get_by_title(pool: &PgPool, title: &str) -> Result<Vec<IssueArticle>, ApiError> {
    let rows = sqlx::query_as::<_, IssueArticle>(&format!(
        "{ISSUE_DETAIL_SELECT} WHERE i.issue_title = $1"
    ))
    .bind(title)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Err(ApiError::not_found(format!(
            "No issue found by that title: {title}"
        )));
    }
    Ok(rows.into_iter().map(IssueArticle::shaped).collect())
}

/// The most recently published issue with its articles. An empty database
/// yields an empty list.
pub async fn get_current(pool: &PgPool) -> Result<Vec<IssueArticle>, ApiError> {
    let rows = sqlx::query_as::<_, IssueArticle>(&format!(
        "{ISSUE_DETAIL_SELECT}
         WHERE i.id = (SELECT id FROM issues ORDER BY pub_date DESC, id DESC LIMIT 1)"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(IssueArticle::shaped).collect())
}

/// Fetch-then-write update with the usual falsy fallback per field.
pub async fn update(pool: &PgPool, id: i32, patch: IssuePatch) -> Result<IssueRecord, ApiError> {
    let existing = sqlx::query_as::<_, IssueRecord>(&format!(
        "SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No issue by that id: {id}")))?;

    let issue = sqlx::query_as::<_, IssueRecord>(&format!(
        "UPDATE issues
         SET issue_title = $1, volume = $2, issue = $3, pub_date = $4
         WHERE id = $5
         RETURNING {ISSUE_COLUMNS}"
    ))
    .bind(patch_str(patch.issue_title, existing.issue_title))
    .bind(patch_int(patch.volume, existing.volume))
    .bind(patch_int(patch.issue, existing.issue))
    .bind(patch_or(patch.pub_date, existing.pub_date))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("Duplicate issue title")
        } else {
            err.into()
        }
    })?;

    Ok(issue)
}

/// Delete by id. Articles in the issue survive with their issue reference
/// nulled (FK action).
pub async fn delete(pool: &PgPool, id: i32) -> Result<IssueRecord, ApiError> {
    sqlx::query_as::<_, IssueRecord>(&format!(
        "DELETE FROM issues WHERE id = $1 RETURNING {ISSUE_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No issue found by id: {id}")))
}
