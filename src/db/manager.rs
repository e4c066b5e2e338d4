//! Process-wide database connection lifecycle
//!
//! `ConnectionManager` is created once at startup and shared as
//! `Arc<ConnectionManager>`. The first call to [`ConnectionManager::acquire`]
//! starts a connect attempt; callers that arrive while it is in flight await
//! the same attempt. A successful pool is cached until [`ConnectionManager::close`].
//! A failed attempt is forgotten so the next caller starts a fresh one.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{create_pool, migrations, DynDatabasePool};
use crate::config::DatabaseConfig;

/// Opens a new database pool
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<DynDatabasePool>;
}

/// Connector that builds the pool from configuration and brings the schema up to date
pub struct ConfigConnector {
    config: DatabaseConfig,
}

impl ConfigConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for ConfigConnector {
    async fn connect(&self) -> Result<DynDatabasePool> {
        let pool = create_pool(&self.config).await?;
        migrations::run_migrations(&pool).await?;
        Ok(pool)
    }
}

/// Failure of a shared connect attempt.
///
/// Cloned to every caller that awaited the attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to connect to database: {0:#}")]
pub struct ConnectError(Arc<anyhow::Error>);

impl From<anyhow::Error> for ConnectError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

type ConnectAttempt = Shared<BoxFuture<'static, Result<DynDatabasePool, ConnectError>>>;

enum Slot {
    Idle,
    Connecting(ConnectAttempt),
    Ready(DynDatabasePool),
}

/// Owner of the single cached database pool
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    slot: Mutex<Slot>,
}

impl ConnectionManager {
    /// Create a manager; no connection is made until the first `acquire`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(Slot::Idle),
        }
    }

    /// Create a manager that connects using the given configuration
    pub fn from_config(config: DatabaseConfig) -> Self {
        Self::new(Arc::new(ConfigConnector::new(config)))
    }

    /// Create a manager that is already connected to `pool`.
    ///
    /// The manager has no way to reopen `pool`: after `close`, `acquire` fails.
    pub fn with_pool(pool: DynDatabasePool) -> Self {
        Self {
            connector: Arc::new(NoReconnect),
            slot: Mutex::new(Slot::Ready(pool)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the shared pool, connecting if necessary
    pub async fn acquire(&self) -> Result<DynDatabasePool, ConnectError> {
        let attempt = {
            let mut slot = self.lock();
            match &*slot {
                Slot::Ready(pool) => {
                    tracing::debug!("Using existing database connection");
                    return Ok(pool.clone());
                }
                Slot::Connecting(attempt) => attempt.clone(),
                Slot::Idle => {
                    let connector = self.connector.clone();
                    let attempt = async move {
                        connector.connect().await.map_err(ConnectError::from)
                    }
                    .boxed()
                    .shared();
                    *slot = Slot::Connecting(attempt.clone());
                    attempt
                }
            }
        };

        let result = attempt.clone().await;

        let mut slot = self.lock();
        // Only the attempt that is still pending may settle the slot
        let settles = matches!(&*slot, Slot::Connecting(pending) if pending.ptr_eq(&attempt));
        if settles {
            match &result {
                Ok(pool) => {
                    tracing::info!("Connected to database: {:?}", pool.driver());
                    *slot = Slot::Ready(pool.clone());
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    *slot = Slot::Idle;
                }
            }
        }

        result
    }

    /// Whether a pool is currently cached
    pub fn is_connected(&self) -> bool {
        matches!(&*self.lock(), Slot::Ready(_))
    }

    /// Close the cached pool, if any. A later `acquire` connects again.
    ///
    /// An attempt in flight stays in the slot until it settles, so callers
    /// arriving meanwhile still share it; its pool is then closed.
    pub async fn close(&self) {
        let pool = loop {
            let attempt = {
                let mut slot = self.lock();
                match std::mem::replace(&mut *slot, Slot::Idle) {
                    Slot::Idle => return,
                    Slot::Ready(pool) => break pool,
                    Slot::Connecting(attempt) => {
                        *slot = Slot::Connecting(attempt.clone());
                        attempt
                    }
                }
            };

            let result = attempt.clone().await;

            let settled = {
                let mut slot = self.lock();
                if matches!(&*slot, Slot::Connecting(pending) if pending.ptr_eq(&attempt)) {
                    *slot = Slot::Idle;
                    Some(result)
                } else {
                    None
                }
            };
            match settled {
                Some(Ok(pool)) => break pool,
                Some(Err(_)) => return,
                // Settled by an `acquire` caller; look again
                None => continue,
            }
        };

        pool.close().await;
        tracing::info!("Database connection closed");
    }
}

/// Connector for managers built around an existing pool
struct NoReconnect;

#[async_trait]
impl Connector for NoReconnect {
    async fn connect(&self) -> Result<DynDatabasePool> {
        anyhow::bail!("pool was closed and cannot be reopened")
    }
}
