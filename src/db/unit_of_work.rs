//! Transaction handle passed through repository calls
//!
//! A `UnitOfWork` wraps an open sqlx transaction for whichever backend the
//! pool was created for. Every transactional repository method takes
//! `&mut UnitOfWork`; the owner closes it exactly once with [`UnitOfWork::commit`]
//! or [`UnitOfWork::rollback`]. Dropping it without either rolls back.

use anyhow::{Context, Result};
use sqlx::{MySql, Sqlite, Transaction};

use crate::config::DatabaseDriver;

/// An open database transaction
pub enum UnitOfWork {
    Sqlite(Transaction<'static, Sqlite>),
    Mysql(Transaction<'static, MySql>),
}

impl UnitOfWork {
    /// Commit every write made through this unit of work
    pub async fn commit(self) -> Result<()> {
        match self {
            UnitOfWork::Sqlite(tx) => tx.commit().await.context("Failed to commit transaction"),
            UnitOfWork::Mysql(tx) => tx.commit().await.context("Failed to commit transaction"),
        }
    }

    /// Discard every write made through this unit of work
    pub async fn rollback(self) -> Result<()> {
        match self {
            UnitOfWork::Sqlite(tx) => tx
                .rollback()
                .await
                .context("Failed to roll back transaction"),
            UnitOfWork::Mysql(tx) => tx
                .rollback()
                .await
                .context("Failed to roll back transaction"),
        }
    }

    pub fn driver(&self) -> DatabaseDriver {
        match self {
            UnitOfWork::Sqlite(_) => DatabaseDriver::Sqlite,
            UnitOfWork::Mysql(_) => DatabaseDriver::Mysql,
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UnitOfWork").field(&self.driver()).finish()
    }
}
