//! Local cache of open pull requests.
//!
//! The refresh engine is the single writer: each pass replaces the cache
//! wholesale with the latest fetched snapshot. Readers (the drill-down
//! query) tolerate eventually-consistent reads.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::PullRequest;

/// Replace the cached pull requests with a fresh snapshot.
pub async fn replace_all(pool: &DbPool, pull_requests: &[PullRequest]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM pull_requests")
        .execute(&mut *tx)
        .await?;

    for pr in pull_requests {
        let repository = &pr.from_ref.repository;
        let payload = serde_json::to_string(pr)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO pull_requests
                (id, project_key, repo_slug, title, state, created_date, updated_date, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(pr.id)
        .bind(&repository.project.key)
        .bind(&repository.slug)
        .bind(&pr.title)
        .bind(pr.state.as_str())
        .bind(pr.created_date)
        .bind(pr.updated_date)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load all cached pull requests, most recently updated first.
pub async fn get_all(pool: &DbPool) -> Result<Vec<PullRequest>, AppError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT payload FROM pull_requests ORDER BY updated_date DESC")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|(payload,)| serde_json::from_str(&payload).map_err(AppError::from))
        .collect()
}

/// Cached pull requests where the given user is a reviewer who has not yet
/// approved, most recently updated first.
///
/// Serves the per-reviewer drill-down view; reviewer membership lives inside
/// the JSON payload, so filtering happens after deserialization.
pub async fn under_review_by(pool: &DbPool, user_slug: &str) -> Result<Vec<PullRequest>, AppError> {
    let all = get_all(pool).await?;

    Ok(all
        .into_iter()
        .filter(|pr| {
            pr.unapproved_reviewers()
                .any(|member| member.user.slug == user_slug)
        })
        .collect())
}
