//! Queries for the tracked-repository selection.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{Project, Repository};
use sqlx::Row;
use tokio::sync::watch;

/// Load the current selection, in the order the user arranged it.
pub async fn get_selected(pool: &DbPool) -> Result<Vec<Repository>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT project_key, slug, name, project_name, project_description
        FROM selected_repositories
        ORDER BY position ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let repositories = rows
        .into_iter()
        .map(|row| Repository {
            slug: row.get("slug"),
            name: row.get("name"),
            project: Project {
                key: row.get("project_key"),
                name: row.get("project_name"),
                description: row.get("project_description"),
            },
        })
        .collect();

    Ok(repositories)
}

/// Replace the selection wholesale.
pub async fn set_selected(pool: &DbPool, repositories: &[Repository]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM selected_repositories")
        .execute(&mut *tx)
        .await?;

    for (position, repo) in repositories.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO selected_repositories
                (project_key, slug, name, project_name, project_description, position)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&repo.project.key)
        .bind(&repo.slug)
        .bind(&repo.name)
        .bind(&repo.project.name)
        .bind(&repo.project.description)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Persisted repository selection with a live view of its current value.
///
/// Writers go through [`RepositorySelection::set`], which commits to the
/// database first and only then publishes on the watch channel, so observers
/// never see a selection the database does not hold.
pub struct RepositorySelection {
    pool: DbPool,
    tx: watch::Sender<Vec<Repository>>,
}

impl RepositorySelection {
    pub async fn new(pool: DbPool) -> Result<Self, AppError> {
        let current = get_selected(&pool).await?;
        let (tx, _rx) = watch::channel(current);
        Ok(Self { pool, tx })
    }

    /// Watch the selection; the receiver always starts at the latest value.
    pub fn selection(&self) -> watch::Receiver<Vec<Repository>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Vec<Repository> {
        self.tx.borrow().clone()
    }

    pub async fn set(&self, repositories: &[Repository]) -> Result<(), AppError> {
        set_selected(&self.pool, repositories).await?;
        self.tx.send_replace(repositories.to_vec());
        Ok(())
    }
}
