//! Database migrations module
//!
//! Code-based migrations for the DevFlow schema. All migrations are embedded
//! as SQL strings for both SQLite and MySQL.
//!
//! # Usage
//!
//! ```ignore
//! use devflow::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Each migration is a `Migration` with a unique, increasing `version` and
//! one SQL script per backend. Applied versions are recorded in `_migrations`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{DynDatabasePool, UnitOfWork};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    // questions.tag_ids is a JSON array mirroring tag_questions for fast reads
    Migration {
        version: 1,
        name: "create_questions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                tag_ids TEXT NOT NULL DEFAULT '[]',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_questions_author_id ON questions(author_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                content LONGTEXT NOT NULL,
                author_id BIGINT NOT NULL,
                tag_ids TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_questions_author_id ON questions(author_id);
        "#,
    },
    // name_key holds the lowercase fold of name; its unique index is what makes
    // tag names unique regardless of case
    Migration {
        version: 2,
        name: "create_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(64) NOT NULL,
                name_key VARCHAR(64) NOT NULL,
                question_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name_key ON tags(name_key);
            CREATE INDEX IF NOT EXISTS idx_tags_question_count ON tags(question_count);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(64) NOT NULL,
                name_key VARCHAR(64) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
                question_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX idx_tags_name_key ON tags(name_key);
            CREATE INDEX idx_tags_question_count ON tags(question_count);
        "#,
    },
    Migration {
        version: 3,
        name: "create_tag_questions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tag_questions (
                question_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (question_id, tag_id),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_tag_questions_tag_id ON tag_questions(tag_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tag_questions (
                question_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (question_id, tag_id),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_tag_questions_tag_id ON tag_questions(tag_id);
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.iter().any(|m| m.version == migration.version as i64) {
            continue;
        }

        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    const SQL: &str = "SELECT version, name, applied_at FROM _migrations ORDER BY version";

    let records = match pool.driver() {
        DatabaseDriver::Sqlite => {
            let rows = sqlx::query(SQL)
                .fetch_all(pool.as_sqlite().context("SQLite pool expected")?)
                .await?;
            rows.iter()
                .map(|row| MigrationRecord {
                    version: row.get("version"),
                    name: row.get("name"),
                    applied_at: row.get("applied_at"),
                })
                .collect()
        }
        DatabaseDriver::Mysql => {
            let rows = sqlx::query(SQL)
                .fetch_all(pool.as_mysql().context("MySQL pool expected")?)
                .await?;
            rows.iter()
                .map(|row| MigrationRecord {
                    version: row.get::<i32, _>("version") as i64,
                    name: row.get("name"),
                    applied_at: row.get("applied_at"),
                })
                .collect()
        }
    };

    Ok(records)
}

/// Apply a single migration and record it.
///
/// Runs inside one transaction. SQLite rolls back DDL on failure; MySQL
/// commits DDL implicitly, so a failed MySQL migration may be partially applied.
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let mut uow = pool.begin().await?;

    let script = match uow.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    for statement in split_sql_statements(script) {
        let context = || format!("Failed to execute: {}", truncate_sql(statement));
        match &mut uow {
            UnitOfWork::Sqlite(tx) => {
                sqlx::query(statement).execute(&mut **tx).await.with_context(context)?;
            }
            UnitOfWork::Mysql(tx) => {
                sqlx::query(statement).execute(&mut **tx).await.with_context(context)?;
            }
        }
    }

    let record = "INSERT INTO _migrations (version, name) VALUES (?, ?)";
    match &mut uow {
        UnitOfWork::Sqlite(tx) => {
            sqlx::query(record)
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut **tx)
                .await?;
        }
        UnitOfWork::Mysql(tx) => {
            sqlx::query(record)
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut **tx)
                .await?;
        }
    }

    uow.commit().await
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a script into statements on `;`, dropping empty and comment-only pieces
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}
