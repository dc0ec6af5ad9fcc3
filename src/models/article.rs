use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{is_unique_violation, ApiError};

use super::{patch_id, patch_str, teaser};

/// Read projection joining the author and issue a story belongs to. The
/// joined fields go null when the parent rows are gone; the article itself
/// outlives both.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: i32,
    pub article_title: String,
    pub author_first: Option<String>,
    pub author_last: Option<String>,
    pub author_handle: Option<String>,
    pub author_id: Option<i32>,
    pub text: String,
    pub issue_title: Option<String>,
    pub issue_id: Option<i32>,
    pub pub_date: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    /// Read shaping: long body text comes back as a teaser.
    fn shaped(mut self) -> Self {
        self.text = teaser(&self.text);
        self
    }
}

const ARTICLE_SELECT: &str = "SELECT a.id, a.article_title, w.author_first, w.author_last, \
     w.author_handle, a.author_id, a.text, i.issue_title, a.issue_id, i.pub_date
     FROM articles a
     LEFT JOIN authors w ON a.author_id = w.id
     LEFT JOIN issues i ON a.issue_id = i.id";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub article_title: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub text: String,
    pub author_id: Option<i32>,
    pub issue_id: Option<i32>,
}

/// Partial update; omitted fields keep their stored values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    pub article_title: Option<String>,
    pub text: Option<String>,
    pub author_id: Option<i32>,
    pub issue_id: Option<i32>,
}

/// Insert a new article. Author and issue are independently optional and
/// persist as NULL when absent; the title must be unique.
pub async fn create(pool: &PgPool, new: &NewArticle) -> Result<ArticleRecord, ApiError> {
    let clash: Option<(i32,)> = sqlx::query_as("SELECT id FROM articles WHERE article_title = $1")
        .bind(&new.article_title)
        .fetch_optional(pool)
        .await?;

    if clash.is_some() {
        return Err(ApiError::conflict(format!(
            "Duplicate article title: {}",
            new.article_title
        )));
    }

    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO articles (article_title, author_id, text, issue_id)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(&new.article_title)
    .bind(new.author_id)
    .bind(&new.text)
    .bind(new.issue_id)
    .fetch_one(pool)
    .await?;

    // Re-read through the join so the echo carries the author/issue fields.
    fetch(pool, id)
        .await?
        .ok_or_else(|| ApiError::internal("article vanished between insert and read"))
}

async fn fetch(pool: &PgPool, id: i32) -> Result<Option<ArticleRecord>, ApiError> {
    let article = sqlx::query_as::<_, ArticleRecord>(&format!("{ARTICLE_SELECT} WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(article)
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<ArticleRecord>, ApiError> {
    let articles = sqlx::query_as::<_, ArticleRecord>(&format!(
        "{ARTICLE_SELECT} ORDER BY LOWER(a.article_title)"
    ))
    .fetch_all(pool)
    .await?;
    Ok(articles.into_iter().map(ArticleRecord::shaped).collect())
}

pub async fn get(pool: &PgPool, id: i32) -> Result<ArticleRecord, ApiError> {
    fetch(pool, id)
        .await?
        .map(ArticleRecord::shaped)
        .ok_or_else(|| ApiError::not_found(format!("No article found by that id: {id}")))
}

pub async fn get_by_title(pool: &PgPool, title: &str) -> Result<ArticleRecord, ApiError> {
    sqlx::query_as::<_, ArticleRecord>(&format!("{ARTICLE_SELECT} WHERE a.article_title = $1"))
        .bind(title)
        .fetch_optional(pool)
        .await?
        .map(ArticleRecord::shaped)
        .ok_or_else(|| ApiError::not_found(format!("No article found by that title: {title}")))
}

/// All articles by one author, looked up by handle.
pub async fn fetch_by_author(pool: &PgPool, handle: &str) -> Result<Vec<ArticleRecord>, ApiError> {
    let articles = sqlx::query_as::<_, ArticleRecord>(&format!(
        "{ARTICLE_SELECT} WHERE w.author_handle = $1 ORDER BY LOWER(a.article_title)"
    ))
    .bind(handle)
    .fetch_all(pool)
    .await?;

    if articles.is_empty() {
        return Err(ApiError::not_found(format!(
            "No articles found by that author handle: {handle}"
        )));
    }
    Ok(articles.into_iter().map(ArticleRecord::shaped).collect())
}

/// All articles carrying an exact keyword tag.
pub async fn fetch_by_keyword(pool: &PgPool, keyword: &str) -> Result<Vec<ArticleRecord>, ApiError> {
    let articles = sqlx::query_as::<_, ArticleRecord>(&format!(
        "{ARTICLE_SELECT}
         INNER JOIN article_keywords ak ON a.id = ak.article_id
         WHERE ak.keyword = $1
         ORDER BY LOWER(a.article_title)"
    ))
    .bind(keyword)
    .fetch_all(pool)
    .await?;

    if articles.is_empty() {
        return Err(ApiError::not_found(format!(
            "No articles found associated with that keyword: {keyword}"
        )));
    }
    Ok(articles.into_iter().map(ArticleRecord::shaped).collect())
}

/// Free-text search: the ids of every article whose title or body contains
/// any of the terms, case-insensitively. Quote marks around a term are
/// stripped, not otherwise special. No matches is an empty set, not an
/// error.
pub async fn search(pool: &PgPool, terms: &[String]) -> Result<HashSet<i32>, ApiError> {
    let mut ids = HashSet::new();

    for term in terms {
        let needle = strip_quotes(term.trim());
        if needle.is_empty() {
            continue;
        }
        let pattern = format!("%{needle}%");
        let rows: Vec<(i32,)> =
            sqlx::query_as("SELECT id FROM articles WHERE article_title ILIKE $1 OR text ILIKE $1")
                .bind(&pattern)
                .fetch_all(pool)
                .await?;
        ids.extend(rows.into_iter().map(|(id,)| id));
    }

    Ok(ids)
}

/// Peel one layer of matching wrap quotes off a search term.
pub fn strip_quotes(term: &str) -> &str {
    let bytes = term.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &term[1..term.len() - 1];
        }
    }
    term
}

/// Fetch-then-write update with the usual falsy fallback per field.
pub async fn update(pool: &PgPool, id: i32, patch: ArticlePatch) -> Result<ArticleRecord, ApiError> {
    let existing = sqlx::query_as::<_, ExistingArticle>(
        "SELECT article_title, author_id, text, issue_id FROM articles WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("No article found by that id: {id}")))?;

    sqlx::query(
        "UPDATE articles
         SET article_title = $1, author_id = $2, text = $3, issue_id = $4
         WHERE id = $5",
    )
    .bind(patch_str(patch.article_title, existing.article_title))
    .bind(patch_id(patch.author_id, existing.author_id))
    .bind(patch_str(patch.text, existing.text))
    .bind(patch_id(patch.issue_id, existing.issue_id))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("Duplicate article title")
        } else {
            err.into()
        }
    })?;

    fetch(pool, id)
        .await?
        .map(ArticleRecord::shaped)
        .ok_or_else(|| ApiError::not_found(format!("No article found by that id: {id}")))
}

/// Delete by id, echoing the row as it stood. Keyword associations go with
/// it (FK cascade); comments survive with a nulled article reference.
pub async fn delete(pool: &PgPool, id: i32) -> Result<ArticleRecord, ApiError> {
    let echo = fetch(pool, id)
        .await?
        .map(ArticleRecord::shaped)
        .ok_or_else(|| ApiError::not_found(format!("No article found by id: {id}")))?;

    sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(echo)
}

#[derive(FromRow)]
struct ExistingArticle {
    article_title: String,
    author_id: Option<i32>,
    text: String,
    issue_id: Option<i32>,
}
