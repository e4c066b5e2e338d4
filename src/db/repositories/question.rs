//! Question repository
//!
//! Database operations for questions. Writes run inside a caller-owned
//! [`UnitOfWork`]; reads outside a transaction go through the shared pool.

use crate::config::DatabaseDriver;
use crate::db::{ConnectionManager, UnitOfWork};
use crate::models::Question;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, Row, SqliteConnection};
use std::sync::Arc;

const QUESTION_COLUMNS: &str = "id, title, content, author_id, tag_ids, created_at, updated_at";

/// Question repository trait
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Create a question with no tags yet
    async fn insert(
        &self,
        uow: &mut UnitOfWork,
        title: &str,
        content: &str,
        author_id: i64,
    ) -> Result<Question>;

    /// Add `tag_ids` to the question's tag list, skipping ids already present.
    ///
    /// Returns the merged list.
    async fn attach_tag_ids(
        &self,
        uow: &mut UnitOfWork,
        question_id: i64,
        tag_ids: &[i64],
    ) -> Result<Vec<i64>>;

    /// Replace title and content, leaving author and tags untouched.
    ///
    /// Returns `None` if the question does not exist.
    async fn update(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        title: &str,
        content: &str,
    ) -> Result<Option<Question>>;

    /// Get question by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>>;

    /// Get question by ID as seen inside `uow`
    async fn get_by_id_tx(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Question>>;
}

/// SQLx-based question repository implementation
pub struct SqlxQuestionRepository {
    connections: Arc<ConnectionManager>,
}

impl SqlxQuestionRepository {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    pub fn boxed(connections: Arc<ConnectionManager>) -> Arc<dyn QuestionRepository> {
        Arc::new(Self::new(connections))
    }
}

#[async_trait]
impl QuestionRepository for SqlxQuestionRepository {
    async fn insert(
        &self,
        uow: &mut UnitOfWork,
        title: &str,
        content: &str,
        author_id: i64,
    ) -> Result<Question> {
        let now = Utc::now();
        let id = match uow {
            UnitOfWork::Sqlite(tx) => insert_question_sqlite(tx, title, content, author_id, now).await?,
            UnitOfWork::Mysql(tx) => insert_question_mysql(tx, title, content, author_id, now).await?,
        };

        Ok(Question {
            id,
            title: title.to_string(),
            content: content.to_string(),
            author_id,
            tag_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn attach_tag_ids(
        &self,
        uow: &mut UnitOfWork,
        question_id: i64,
        tag_ids: &[i64],
    ) -> Result<Vec<i64>> {
        let mut question = self
            .get_by_id_tx(uow, question_id)
            .await?
            .with_context(|| format!("Question not found: {}", question_id))?;

        question.merge_tag_ids(tag_ids);
        let encoded = serde_json::to_string(&question.tag_ids)?;

        let sql = "UPDATE questions SET tag_ids = ? WHERE id = ?";
        match uow {
            UnitOfWork::Sqlite(tx) => {
                sqlx::query(sql)
                    .bind(&encoded)
                    .bind(question_id)
                    .execute(&mut **tx)
                    .await
                    .map(|_| ())
            }
            UnitOfWork::Mysql(tx) => {
                sqlx::query(sql)
                    .bind(&encoded)
                    .bind(question_id)
                    .execute(&mut **tx)
                    .await
                    .map(|_| ())
            }
        }
        .context("Failed to attach tags to question")?;

        Ok(question.tag_ids)
    }

    async fn update(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        title: &str,
        content: &str,
    ) -> Result<Option<Question>> {
        let sql = "UPDATE questions SET title = ?, content = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match uow {
            UnitOfWork::Sqlite(tx) => {
                sqlx::query(sql)
                    .bind(title)
                    .bind(content)
                    .bind(now)
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .map(|_| ())
            }
            UnitOfWork::Mysql(tx) => {
                sqlx::query(sql)
                    .bind(title)
                    .bind(content)
                    .bind(now)
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .map(|_| ())
            }
        }
        .context("Failed to update question")?;

        // MySQL reports zero affected rows for an unchanged row, so existence is
        // decided by re-reading
        self.get_by_id_tx(uow, id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Question>> {
        let pool = self.connections.acquire().await?;
        let sql = format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS);
        match pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool.as_sqlite().context("SQLite pool expected")?)
                    .await
                    .context("Failed to get question by ID")?;
                row.as_ref().map(row_to_question_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool.as_mysql().context("MySQL pool expected")?)
                    .await
                    .context("Failed to get question by ID")?;
                row.as_ref().map(row_to_question_mysql).transpose()
            }
        }
    }

    async fn get_by_id_tx(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Question>> {
        match uow {
            UnitOfWork::Sqlite(tx) => get_question_sqlite(tx, id).await,
            UnitOfWork::Mysql(tx) => get_question_mysql(tx, id).await,
        }
    }
}

fn decode_tag_ids(raw: &str) -> Result<Vec<i64>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid tag_ids column: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_question_sqlite(
    conn: &mut SqliteConnection,
    title: &str,
    content: &str,
    author_id: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO questions (title, content, author_id, tag_ids, created_at, updated_at)
        VALUES (?, ?, ?, '[]', ?, ?)
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await
    .context("Failed to create question")?;

    Ok(result.last_insert_rowid())
}

async fn get_question_sqlite(conn: &mut SqliteConnection, id: i64) -> Result<Option<Question>> {
    let row = sqlx::query(&format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("Failed to get question by ID")?;

    row.as_ref().map(row_to_question_sqlite).transpose()
}

fn row_to_question_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Question> {
    let tag_ids: String = row.try_get("tag_ids")?;
    Ok(Question {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        tag_ids: decode_tag_ids(&tag_ids)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_question_mysql(
    conn: &mut MySqlConnection,
    title: &str,
    content: &str,
    author_id: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO questions (title, content, author_id, tag_ids, created_at, updated_at)
        VALUES (?, ?, ?, '[]', ?, ?)
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await
    .context("Failed to create question")?;

    Ok(result.last_insert_id() as i64)
}

async fn get_question_mysql(conn: &mut MySqlConnection, id: i64) -> Result<Option<Question>> {
    // Lock the row so a read-modify-write of tag_ids cannot interleave
    let row = sqlx::query(&format!(
        "SELECT {} FROM questions WHERE id = ? FOR UPDATE",
        QUESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .context("Failed to get question by ID")?;

    row.as_ref().map(row_to_question_mysql).transpose()
}

fn row_to_question_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Question> {
    let tag_ids: String = row.try_get("tag_ids")?;
    Ok(Question {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        tag_ids: decode_tag_ids(&tag_ids)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, SqlxQuestionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxQuestionRepository::new(Arc::new(ConnectionManager::with_pool(pool.clone())));
        (pool, repo)
    }

    async fn insert_committed(pool: &DynDatabasePool, repo: &SqlxQuestionRepository) -> Question {
        let mut uow = pool.begin().await.unwrap();
        let question = repo
            .insert(&mut uow, "What is a borrow?", "Explain please", 7)
            .await
            .expect("Failed to insert question");
        uow.commit().await.unwrap();
        question
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (pool, repo) = setup().await;
        let question = insert_committed(&pool, &repo).await;

        assert!(question.id > 0);
        assert!(question.tag_ids.is_empty());

        let fetched = repo
            .get_by_id(question.id)
            .await
            .expect("Failed to get question")
            .expect("Question should exist");
        assert_eq!(fetched.title, "What is a borrow?");
        assert_eq!(fetched.author_id, 7);
        assert!(fetched.tag_ids.is_empty());
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (_pool, repo) = setup().await;
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rolled_back_is_invisible() {
        let (pool, repo) = setup().await;

        let mut uow = pool.begin().await.unwrap();
        let question = repo.insert(&mut uow, "Temporary", "Body", 1).await.unwrap();
        let seen = repo.get_by_id_tx(&mut uow, question.id).await.unwrap();
        assert!(seen.is_some());
        uow.rollback().await.unwrap();

        assert!(repo.get_by_id(question.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attach_tag_ids_is_idempotent() {
        let (pool, repo) = setup().await;
        let question = insert_committed(&pool, &repo).await;

        let mut uow = pool.begin().await.unwrap();
        let merged = repo.attach_tag_ids(&mut uow, question.id, &[3, 1]).await.unwrap();
        assert_eq!(merged, vec![3, 1]);
        let merged = repo.attach_tag_ids(&mut uow, question.id, &[1, 2]).await.unwrap();
        assert_eq!(merged, vec![3, 1, 2]);
        uow.commit().await.unwrap();

        let fetched = repo.get_by_id(question.id).await.unwrap().unwrap();
        assert_eq!(fetched.tag_ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_attach_to_missing_question_fails() {
        let (pool, repo) = setup().await;

        let mut uow = pool.begin().await.unwrap();
        let result = repo.attach_tag_ids(&mut uow, 9999, &[1]).await;
        uow.rollback().await.unwrap();

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_replaces_text_only() {
        let (pool, repo) = setup().await;
        let question = insert_committed(&pool, &repo).await;

        let mut uow = pool.begin().await.unwrap();
        repo.attach_tag_ids(&mut uow, question.id, &[5]).await.unwrap();
        let updated = repo
            .update(&mut uow, question.id, "What is a lifetime?", "Edited body")
            .await
            .expect("Failed to update question")
            .expect("Question should exist");
        uow.commit().await.unwrap();

        assert_eq!(updated.title, "What is a lifetime?");
        assert_eq!(updated.content, "Edited body");
        assert_eq!(updated.author_id, 7);
        assert_eq!(updated.tag_ids, vec![5]);
        assert!(updated.updated_at >= question.updated_at);
    }

    #[tokio::test]
    async fn test_update_nonexistent_returns_none() {
        let (pool, repo) = setup().await;

        let mut uow = pool.begin().await.unwrap();
        let result = repo.update(&mut uow, 9999, "Title here", "Body").await.unwrap();
        uow.rollback().await.unwrap();

        assert!(result.is_none());
    }
}
