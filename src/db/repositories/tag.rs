//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL
//!
//! `find_or_create` is the only write. It resolves a label to its tag and
//! counts one more use in a single server-side upsert on the unique
//! `name_key` index, so concurrent first uses of a label converge on one row.

use crate::config::DatabaseDriver;
use crate::db::{ConnectionManager, UnitOfWork};
use crate::models::{tag_name_key, PagedResult, Tag, TagListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

const TAG_COLUMNS: &str = "id, name, question_count, created_at";

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Resolve `name` to its tag, creating it if no tag matches case-insensitively,
    /// and increment its question count by one.
    ///
    /// Atomic: when two open transactions resolve the same new name, exactly one
    /// creates the row and the other increments it.
    async fn find_or_create(&self, uow: &mut UnitOfWork, name: &str) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by name, ignoring case
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Get tags linked to a question
    async fn get_by_question_id(&self, question_id: i64) -> Result<Vec<Tag>>;

    /// List tags with optional name search, sorting and pagination
    async fn list(&self, params: &TagListParams) -> Result<PagedResult<Tag>>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    connections: Arc<ConnectionManager>,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(connections: Arc<ConnectionManager>) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(connections))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn find_or_create(&self, uow: &mut UnitOfWork, name: &str) -> Result<Tag> {
        match uow {
            UnitOfWork::Sqlite(tx) => find_or_create_tag_sqlite(tx, name).await,
            UnitOfWork::Mysql(tx) => find_or_create_tag_mysql(tx, name).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let pool = self.connections.acquire().await?;
        let sql = format!("SELECT {} FROM tags WHERE id = ?", TAG_COLUMNS);
        match pool.driver() {
            DatabaseDriver::Sqlite => {
                fetch_optional_sqlite(pool.as_sqlite().context("SQLite pool expected")?, &sql, id).await
            }
            DatabaseDriver::Mysql => {
                fetch_optional_mysql(pool.as_mysql().context("MySQL pool expected")?, &sql, id).await
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let pool = self.connections.acquire().await?;
        let key = tag_name_key(name);
        match pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_by_key_sqlite(pool.as_sqlite().context("SQLite pool expected")?, &key).await
            }
            DatabaseDriver::Mysql => {
                get_tag_by_key_mysql(pool.as_mysql().context("MySQL pool expected")?, &key).await
            }
        }
    }

    async fn get_by_question_id(&self, question_id: i64) -> Result<Vec<Tag>> {
        let pool = self.connections.acquire().await?;
        match pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tags_by_question_sqlite(pool.as_sqlite().context("SQLite pool expected")?, question_id)
                    .await
            }
            DatabaseDriver::Mysql => {
                get_tags_by_question_mysql(pool.as_mysql().context("MySQL pool expected")?, question_id)
                    .await
            }
        }
    }

    async fn list(&self, params: &TagListParams) -> Result<PagedResult<Tag>> {
        let pool = self.connections.acquire().await?;
        match pool.driver() {
            DatabaseDriver::Sqlite => {
                list_tags_sqlite(pool.as_sqlite().context("SQLite pool expected")?, params).await
            }
            DatabaseDriver::Mysql => {
                list_tags_mysql(pool.as_mysql().context("MySQL pool expected")?, params).await
            }
        }
    }
}

/// WHERE clause and LIKE pattern for an optional name search.
///
/// `!` escapes LIKE wildcards in the user's text.
fn search_clause(params: &TagListParams) -> (&'static str, Option<String>) {
    match params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => {
            let escaped = tag_name_key(query)
                .replace('!', "!!")
                .replace('%', "!%")
                .replace('_', "!_");
            ("WHERE name_key LIKE ? ESCAPE '!'", Some(format!("%{}%", escaped)))
        }
        None => ("", None),
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_or_create_tag_sqlite(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
    let row = sqlx::query(
        r#"
        INSERT INTO tags (name, name_key, question_count, created_at)
        VALUES (?, ?, 1, ?)
        ON CONFLICT(name_key) DO UPDATE SET question_count = question_count + 1
        RETURNING id, name, question_count, created_at
        "#,
    )
    .bind(name)
    .bind(tag_name_key(name))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("Failed to resolve tag: {}", name))?;

    row_to_tag_sqlite(&row)
}

async fn fetch_optional_sqlite(pool: &SqlitePool, sql: &str, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn get_tag_by_key_sqlite(pool: &SqlitePool, key: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!("SELECT {} FROM tags WHERE name_key = ?", TAG_COLUMNS))
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn get_tags_by_question_sqlite(pool: &SqlitePool, question_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.question_count, t.created_at
        FROM tags t
        INNER JOIN tag_questions tq ON tq.tag_id = t.id
        WHERE tq.question_id = ?
        ORDER BY t.name_key
        "#,
    )
    .bind(question_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags by question")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

async fn list_tags_sqlite(pool: &SqlitePool, params: &TagListParams) -> Result<PagedResult<Tag>> {
    let (filter, pattern) = search_clause(params);

    let count_sql = format!("SELECT COUNT(*) FROM tags {}", filter);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(pattern) = &pattern {
        count_query = count_query.bind(pattern);
    }
    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count tags")?;

    let list_sql = format!(
        "SELECT {} FROM tags {} ORDER BY {} LIMIT ? OFFSET ?",
        TAG_COLUMNS,
        filter,
        params.filter.order_by()
    );
    let mut list_query = sqlx::query(&list_sql);
    if let Some(pattern) = &pattern {
        list_query = list_query.bind(pattern);
    }
    let rows = list_query
        .bind(params.page.limit())
        .bind(params.page.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    let tags = rows.iter().map(row_to_tag_sqlite).collect::<Result<Vec<_>>>()?;
    Ok(PagedResult::new(tags, total, &params.page))
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        question_count: row.try_get("question_count")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_or_create_tag_mysql(conn: &mut MySqlConnection, name: &str) -> Result<Tag> {
    let key = tag_name_key(name);

    sqlx::query(
        r#"
        INSERT INTO tags (name, name_key, question_count, created_at)
        VALUES (?, ?, 1, ?)
        ON DUPLICATE KEY UPDATE question_count = question_count + 1
        "#,
    )
    .bind(name)
    .bind(&key)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to resolve tag: {}", name))?;

    // The upsert holds the row lock until commit, so this read sees our increment
    let row = sqlx::query(&format!("SELECT {} FROM tags WHERE name_key = ?", TAG_COLUMNS))
        .bind(&key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to read resolved tag: {}", name))?;

    row_to_tag_mysql(&row)
}

async fn fetch_optional_mysql(pool: &MySqlPool, sql: &str, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn get_tag_by_key_mysql(pool: &MySqlPool, key: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!("SELECT {} FROM tags WHERE name_key = ?", TAG_COLUMNS))
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn get_tags_by_question_mysql(pool: &MySqlPool, question_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.question_count, t.created_at
        FROM tags t
        INNER JOIN tag_questions tq ON tq.tag_id = t.id
        WHERE tq.question_id = ?
        ORDER BY t.name_key
        "#,
    )
    .bind(question_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags by question")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

async fn list_tags_mysql(pool: &MySqlPool, params: &TagListParams) -> Result<PagedResult<Tag>> {
    let (filter, pattern) = search_clause(params);

    let count_sql = format!("SELECT COUNT(*) FROM tags {}", filter);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(pattern) = &pattern {
        count_query = count_query.bind(pattern);
    }
    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count tags")?;

    let list_sql = format!(
        "SELECT {} FROM tags {} ORDER BY {} LIMIT ? OFFSET ?",
        TAG_COLUMNS,
        filter,
        params.filter.order_by()
    );
    let mut list_query = sqlx::query(&list_sql);
    if let Some(pattern) = &pattern {
        list_query = list_query.bind(pattern);
    }
    let rows = list_query
        .bind(params.page.limit())
        .bind(params.page.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    let tags = rows.iter().map(row_to_tag_mysql).collect::<Result<Vec<_>>>()?;
    Ok(PagedResult::new(tags, total, &params.page))
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        question_count: row.try_get("question_count")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ListParams, TagFilter};

    async fn setup() -> (Arc<ConnectionManager>, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let connections = Arc::new(ConnectionManager::with_pool(pool));
        let repo = SqlxTagRepository::new(connections.clone());
        (connections, repo)
    }

    async fn resolve(connections: &ConnectionManager, repo: &SqlxTagRepository, name: &str) -> Tag {
        let pool = connections.acquire().await.unwrap();
        let mut uow = pool.begin().await.unwrap();
        let tag = repo.find_or_create(&mut uow, name).await.expect("Failed to resolve tag");
        uow.commit().await.unwrap();
        tag
    }

    #[tokio::test]
    async fn test_find_or_create_creates_with_count_one() {
        let (connections, repo) = setup().await;

        let tag = resolve(&connections, &repo, "Rust").await;

        assert!(tag.id > 0);
        assert_eq!(tag.name, "Rust");
        assert_eq!(tag.question_count, 1);
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_case_insensitively() {
        let (connections, repo) = setup().await;

        let first = resolve(&connections, &repo, "Go").await;
        let second = resolve(&connections, &repo, "go").await;
        let third = resolve(&connections, &repo, "GO").await;

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
        // Display name keeps the casing of the first use
        assert_eq!(third.name, "Go");
        assert_eq!(third.question_count, 3);
    }

    #[tokio::test]
    async fn test_find_or_create_is_anchored() {
        let (connections, repo) = setup().await;

        let rust = resolve(&connections, &repo, "rust").await;
        let rustlang = resolve(&connections, &repo, "rustlang").await;
        let wildcard = resolve(&connections, &repo, "r.*").await;

        assert_ne!(rust.id, rustlang.id);
        assert_ne!(rust.id, wildcard.id);
        assert_eq!(rust.question_count, 1);
    }

    #[tokio::test]
    async fn test_find_or_create_rolled_back_leaves_no_tag() {
        let (connections, repo) = setup().await;

        let pool = connections.acquire().await.unwrap();
        let mut uow = pool.begin().await.unwrap();
        repo.find_or_create(&mut uow, "Ephemeral").await.unwrap();
        uow.rollback().await.unwrap();

        assert!(repo.get_by_name("ephemeral").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_id_and_name() {
        let (connections, repo) = setup().await;
        let tag = resolve(&connections, &repo, "TypeScript").await;

        let by_id = repo.get_by_id(tag.id).await.unwrap().expect("Tag should exist");
        assert_eq!(by_id, tag);

        let by_name = repo.get_by_name("typescript").await.unwrap().expect("Tag should exist");
        assert_eq!(by_name.id, tag.id);

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorts_and_searches() {
        let (connections, repo) = setup().await;
        resolve(&connections, &repo, "beta").await;
        resolve(&connections, &repo, "alpha").await;
        resolve(&connections, &repo, "Alpha").await;
        resolve(&connections, &repo, "gamma_ray").await;

        let popular = repo
            .list(&TagListParams::default())
            .await
            .expect("Failed to list tags");
        assert_eq!(popular.total, 3);
        assert_eq!(popular.items[0].name, "alpha");
        assert_eq!(popular.items[0].question_count, 2);

        let by_name = repo
            .list(&TagListParams {
                filter: TagFilter::Name,
                ..TagListParams::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = by_name.items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma_ray"]);

        let searched = repo
            .list(&TagListParams {
                query: Some("A_R".to_string()),
                ..TagListParams::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.total, 1);
        assert_eq!(searched.items[0].name, "gamma_ray");

        let paged = repo
            .list(&TagListParams {
                page: ListParams::new(2, 2),
                filter: TagFilter::Name,
                query: None,
            })
            .await
            .unwrap();
        assert_eq!(paged.total, 3);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].name, "gamma_ray");
    }

    #[test]
    fn test_search_clause_escapes_wildcards() {
        let params = TagListParams {
            query: Some(" 100%_Sure! ".to_string()),
            ..TagListParams::default()
        };
        let (clause, pattern) = search_clause(&params);
        assert!(clause.contains("LIKE"));
        assert_eq!(pattern.as_deref(), Some("%100!%!_sure!!%"));

        let (clause, pattern) = search_clause(&TagListParams::default());
        assert!(clause.is_empty());
        assert!(pattern.is_none());
    }
}
