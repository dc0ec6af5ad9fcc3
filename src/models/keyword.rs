use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{is_unique_violation, ApiError};

/// Sentinel article id meaning "every existing article" in the add, rename,
/// and delete operations.
pub const ALL_ARTICLES_ID: i32 = 0;

/// Label used in echoes for broadcast operations.
pub const ALL_ARTICLES: &str = "All Articles";

/// One tag bound to one article, as listed by `GET /keywords`.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRecord {
    pub keyword: String,
    pub article_id: i32,
    pub article_title: Option<String>,
}

/// A bare tag, as listed for one article.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct KeywordEntry {
    pub keyword: String,
}

/// Echo for tag additions: which article (or "All Articles") got what.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedKeywords {
    pub article_title: String,
    pub keywords: Vec<String>,
}

/// Echo for renames and deletions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordChange {
    pub article_title: String,
    pub keyword: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewKeywords {
    /// 0 or absent broadcasts to every article.
    pub article_id: Option<i32>,
    #[validate(length(min = 1, message = "must name at least one keyword"))]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct KeywordEdit {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub keyword: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub edit: String,
}

/// Tag one article. Duplicate (article, keyword) pairs are a conflict here,
/// unlike the broadcast path.
pub async fn add_to_article(
    pool: &PgPool,
    article_id: i32,
    keywords: &[String],
) -> Result<AddedKeywords, ApiError> {
    let article_title = title_for(pool, article_id).await?;

    for keyword in keywords {
        sqlx::query("INSERT INTO article_keywords (article_id, keyword) VALUES ($1, $2)")
            .bind(article_id)
            .bind(keyword)
            .execute(pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    ApiError::conflict(format!(
                        "Keyword '{keyword}' is already associated with article {article_id}"
                    ))
                } else {
                    err.into()
                }
            })?;
    }

    Ok(AddedKeywords {
        article_title,
        keywords: keywords.to_vec(),
    })
}

/// Tag every existing article. Articles that already carry one of the tags
/// are skipped rather than failing the batch.
pub async fn add_to_all_articles(
    pool: &PgPool,
    keywords: &[String],
) -> Result<AddedKeywords, ApiError> {
    for keyword in keywords {
        sqlx::query(
            "INSERT INTO article_keywords (article_id, keyword)
             SELECT id, $1 FROM articles
             ON CONFLICT DO NOTHING",
        )
        .bind(keyword)
        .execute(pool)
        .await?;
    }

    Ok(AddedKeywords {
        article_title: ALL_ARTICLES.to_string(),
        keywords: keywords.to_vec(),
    })
}

/// Every association in the system, for the admin overview.
pub async fn get_keywords(pool: &PgPool) -> Result<Vec<KeywordRecord>, ApiError> {
    let keywords = sqlx::query_as::<_, KeywordRecord>(
        "SELECT ak.keyword, ak.article_id, a.article_title
         FROM article_keywords ak
         LEFT JOIN articles a ON ak.article_id = a.id
         ORDER BY LOWER(ak.keyword)",
    )
    .fetch_all(pool)
    .await?;
    Ok(keywords)
}

/// Tags on one article. The article must exist; an untagged article yields
/// an empty list, a deleted one a 404.
pub async fn get_article_keywords(
    pool: &PgPool,
    article_id: i32,
) -> Result<Vec<KeywordEntry>, ApiError> {
    title_for(pool, article_id).await?;

    let keywords = sqlx::query_as::<_, KeywordEntry>(
        "SELECT keyword FROM article_keywords WHERE article_id = $1 ORDER BY LOWER(keyword)",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;
    Ok(keywords)
}

/// Rename a tag on one article, or everywhere when `article_id` is the
/// broadcast sentinel. The broadcast path absorbs rows where the new name
/// already exists instead of failing the batch.
pub async fn update_keywords(
    pool: &PgPool,
    article_id: i32,
    edit: &KeywordEdit,
) -> Result<KeywordChange, ApiError> {
    if article_id == ALL_ARTICLES_ID {
        // Drop the rows the rename would collide with, then rename the rest.
        sqlx::query(
            "DELETE FROM article_keywords ak
             WHERE ak.keyword = $1
               AND EXISTS (SELECT 1 FROM article_keywords
                           WHERE article_id = ak.article_id AND keyword = $2)",
        )
        .bind(&edit.keyword)
        .bind(&edit.edit)
        .execute(pool)
        .await?;

        sqlx::query("UPDATE article_keywords SET keyword = $1 WHERE keyword = $2")
            .bind(&edit.edit)
            .bind(&edit.keyword)
            .execute(pool)
            .await?;

        return Ok(KeywordChange {
            article_title: ALL_ARTICLES.to_string(),
            keyword: edit.edit.clone(),
        });
    }

    let article_title = title_for(pool, article_id).await?;

    sqlx::query("UPDATE article_keywords SET keyword = $1 WHERE keyword = $2 AND article_id = $3")
        .bind(&edit.edit)
        .bind(&edit.keyword)
        .bind(article_id)
        .execute(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::conflict(format!(
                    "Keyword '{}' is already associated with article {article_id}",
                    edit.edit
                ))
            } else {
                err.into()
            }
        })?;

    Ok(KeywordChange {
        article_title,
        keyword: edit.edit.clone(),
    })
}

/// Remove a tag from one article, or everywhere when `article_id` is the
/// broadcast sentinel. Nothing matched is a 404 either way.
pub async fn delete(
    pool: &PgPool,
    article_id: i32,
    keyword: &str,
) -> Result<KeywordChange, ApiError> {
    if article_id == ALL_ARTICLES_ID {
        let result = sqlx::query("DELETE FROM article_keywords WHERE keyword = $1")
            .bind(keyword)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("No keyword found: {keyword}")));
        }

        return Ok(KeywordChange {
            article_title: ALL_ARTICLES.to_string(),
            keyword: keyword.to_string(),
        });
    }

    let article_title = title_for(pool, article_id).await?;

    let result = sqlx::query("DELETE FROM article_keywords WHERE article_id = $1 AND keyword = $2")
        .bind(article_id)
        .bind(keyword)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "No keyword '{keyword}' associated with article {article_id}"
        )));
    }

    Ok(KeywordChange {
        article_title,
        keyword: keyword.to_string(),
    })
}

/// The ids of every article tagged with any of the given terms, matched
/// case-insensitively as substrings. A leading `*` marker (the search
/// syntax for "this is a tag") is stripped. No matches is an empty set.
pub async fn search(pool: &PgPool, terms: &[String]) -> Result<HashSet<i32>, ApiError> {
    let mut ids = HashSet::new();

    for term in terms {
        let needle = term.trim().trim_start_matches('*');
        if needle.is_empty() {
            continue;
        }
        let pattern = format!("%{needle}%");
        let rows: Vec<(i32,)> =
            sqlx::query_as("SELECT DISTINCT article_id FROM article_keywords WHERE keyword ILIKE $1")
                .bind(&pattern)
                .fetch_all(pool)
                .await?;
        ids.extend(rows.into_iter().map(|(id,)| id));
    }

    Ok(ids)
}

async fn title_for(pool: &PgPool, article_id: i32) -> Result<String, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT article_title FROM articles WHERE id = $1")
        .bind(article_id)
        .fetch_optional(pool)
        .await?;
    row.map(|(title,)| title)
        .ok_or_else(|| ApiError::not_found(format!("no article found by that id: {article_id}")))
}
