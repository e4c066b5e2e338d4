//! Database layer
//!
//! This module provides database abstraction for the DevFlow service.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! - `DatabasePool` hides the backend behind a trait object.
//! - `ConnectionManager` owns the single process-wide pool and connects lazily.
//! - `UnitOfWork` is an open transaction handed to every transactional
//!   repository method.
//!
//! # Usage
//!
//! ```ignore
//! use devflow::config::DatabaseConfig;
//! use devflow::db::ConnectionManager;
//!
//! let manager = ConnectionManager::from_config(DatabaseConfig::default());
//! let pool = manager.acquire().await?;
//!
//! let mut uow = pool.begin().await?;
//! // ... repository calls taking &mut uow ...
//! uow.commit().await?;
//! ```

pub mod manager;
pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod unit_of_work;

pub use manager::{ConfigConnector, ConnectError, ConnectionManager, Connector};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use unit_of_work::UnitOfWork;
