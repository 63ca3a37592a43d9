//! Data access.
//!
//! [`Db`] is the single handle every operation goes through. It is built once at
//! startup with [`Db::connect`] and torn down with [`Db::close`]. Each call
//! checks a connection out of the pool and hands it back when the call returns.
use std::str::FromStr as _;

use anyhow::Context as _;
use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use thiserror::Error;
use tracing::{debug, info};

mod filter;
pub(crate) mod queries;
pub(crate) mod repository;
mod util;
mod value;

pub use filter::Filter;
pub use repository::{BelongsTo, Entity};
pub(crate) use util::retry_sqlite;
pub use value::Value;

/// Result type for the data access layer.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure of a store operation.
///
/// "No rows" is never an error. Lookups return `Ok(None)` or an empty list.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not run the query.
    #[error("database query failed")]
    Query(#[source] sqlx::Error),
    /// A uniqueness constraint rejected the write.
    #[error("record conflicts with an existing row: {0}")]
    Conflict(String),
    /// A record the operation depends on does not exist.
    #[error("{entity} {id} does not exist")]
    Missing {
        /// Entity name.
        entity: &'static str,
        /// Key that was looked up.
        id: i64,
    },
}

impl StoreError {
    pub(crate) fn missing<T: Entity>(id: i64) -> Self {
        Self::Missing {
            entity: T::NAME,
            id,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = err
            .as_database_error()
            .filter(|db_err| db_err.is_unique_violation())
            .map(|db_err| db_err.message().to_owned());

        match conflict {
            Some(message) => Self::Conflict(message),
            None => Self::Query(err),
        }
    }
}

/// Injected data access handle.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if needed) the database at `url` and apply pending migrations.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .context("failed to parse database options")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to {url:?}"))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("failed to apply migrations")?;

        info!("database ready at {url}");
        Ok(Self { pool })
    }

    /// Begin a transaction. Unless committed it rolls back when dropped.
    ///
    /// A transaction that reads before it writes can lose the write lock to a
    /// concurrent writer. Run such units through [`retry_sqlite`].
    pub async fn begin(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Close every pooled connection. Pending acquisitions fail afterwards.
    pub async fn close(&self) {
        debug!("closing database pool");
        self.pool.close().await;
    }

    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Commit `tx`, surfacing the failure as a [`StoreError`].
pub(crate) async fn commit(tx: Transaction<'static, Sqlite>) -> StoreResult<()> {
    Ok(tx.commit().await?)
}
