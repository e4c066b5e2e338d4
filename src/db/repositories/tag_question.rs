//! Question-tag link repository
//!
//! A link row records that a question uses a tag. The `(question_id, tag_id)`
//! primary key rejects a second link for the same pair; that rejection is
//! surfaced as [`DuplicateLinkError`] so callers can tell it apart from other
//! storage failures.

use crate::config::DatabaseDriver;
use crate::db::{ConnectionManager, UnitOfWork};
use crate::models::TagQuestion;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, SqliteConnection};
use std::sync::Arc;

/// A link for this `(question_id, tag_id)` pair already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Question {question_id} is already linked to tag {tag_id}")]
pub struct DuplicateLinkError {
    pub question_id: i64,
    pub tag_id: i64,
}

/// Question-tag link repository trait
#[async_trait]
pub trait TagQuestionRepository: Send + Sync {
    /// Insert one link row per tag id for `question_id`.
    ///
    /// Fails with [`DuplicateLinkError`] (inside the `anyhow::Error`) if any pair
    /// is already linked, including a pair repeated in `tag_ids`.
    async fn insert_links(
        &self,
        uow: &mut UnitOfWork,
        question_id: i64,
        tag_ids: &[i64],
    ) -> Result<()>;

    /// Links of a question, ordered by tag id
    async fn list_by_question(&self, question_id: i64) -> Result<Vec<TagQuestion>>;

    /// Number of questions linked to a tag
    async fn count_by_tag(&self, tag_id: i64) -> Result<i64>;
}

/// SQLx-based link repository implementation
pub struct SqlxTagQuestionRepository {
    connections: Arc<ConnectionManager>,
}

impl SqlxTagQuestionRepository {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    pub fn boxed(connections: Arc<ConnectionManager>) -> Arc<dyn TagQuestionRepository> {
        Arc::new(Self::new(connections))
    }
}

#[async_trait]
impl TagQuestionRepository for SqlxTagQuestionRepository {
    async fn insert_links(
        &self,
        uow: &mut UnitOfWork,
        question_id: i64,
        tag_ids: &[i64],
    ) -> Result<()> {
        let now = Utc::now();
        for &tag_id in tag_ids {
            let result = match uow {
                UnitOfWork::Sqlite(tx) => insert_link_sqlite(tx, question_id, tag_id, now).await,
                UnitOfWork::Mysql(tx) => insert_link_mysql(tx, question_id, tag_id, now).await,
            };
            result.map_err(|e| link_error(e, question_id, tag_id))?;
        }
        tracing::debug!("Linked question {} to tags {:?}", question_id, tag_ids);
        Ok(())
    }

    async fn list_by_question(&self, question_id: i64) -> Result<Vec<TagQuestion>> {
        let pool = self.connections.acquire().await?;
        let sql = "SELECT tag_id FROM tag_questions WHERE question_id = ? ORDER BY tag_id";
        let ids = match pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(question_id)
                    .fetch_all(pool.as_sqlite().context("SQLite pool expected")?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(question_id)
                    .fetch_all(pool.as_mysql().context("MySQL pool expected")?)
                    .await
            }
        };
        let ids = ids.context("Failed to list linked tags")?;
        Ok(ids
            .into_iter()
            .map(|tag_id| TagQuestion {
                question_id,
                tag_id,
            })
            .collect())
    }

    async fn count_by_tag(&self, tag_id: i64) -> Result<i64> {
        let pool = self.connections.acquire().await?;
        let sql = "SELECT COUNT(*) FROM tag_questions WHERE tag_id = ?";
        let count = match pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(tag_id)
                    .fetch_one(pool.as_sqlite().context("SQLite pool expected")?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(tag_id)
                    .fetch_one(pool.as_mysql().context("MySQL pool expected")?)
                    .await
            }
        };
        count.context("Failed to count linked questions")
    }
}

/// Map a unique violation to [`DuplicateLinkError`]; keep anything else as-is
fn link_error(err: sqlx::Error, question_id: i64, tag_id: i64) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DuplicateLinkError {
            question_id,
            tag_id,
        }
        .into(),
        _ => anyhow::Error::new(err)
            .context(format!("Failed to link question {} to tag {}", question_id, tag_id)),
    }
}

async fn insert_link_sqlite(
    conn: &mut SqliteConnection,
    question_id: i64,
    tag_id: i64,
    now: chrono::DateTime<Utc>,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO tag_questions (question_id, tag_id, created_at) VALUES (?, ?, ?)")
        .bind(question_id)
        .bind(tag_id)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_link_mysql(
    conn: &mut MySqlConnection,
    question_id: i64,
    tag_id: i64,
    now: chrono::DateTime<Utc>,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO tag_questions (question_id, tag_id, created_at) VALUES (?, ?, ?)")
        .bind(question_id)
        .bind(tag_id)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}
