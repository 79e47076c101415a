//! Persistence for users, products, orders, and revoked tokens.
//!
//! # Backends
//!
//! Each entity has a store trait (see [`store`]) with two implementations:
//!
//! - [`postgres`] - `PostgreSQL` via sqlx, schema `shop`
//! - [`memory`] - in-process maps, used by tests and local development
//!
//! [`Storage`] bundles one implementation of every trait and is what the
//! application state holds.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use store::{OrderStore, ProductStore, RevocationStore, UserStore};

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to
    /// `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// One implementation of every store, shared by all requests.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub orders: Arc<dyn OrderStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pool: Option<PgPool>,
}

impl Storage {
    /// Stores backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(postgres::UserRepository::new(pool.clone())),
            products: Arc::new(postgres::ProductRepository::new(pool.clone())),
            orders: Arc::new(postgres::OrderRepository::new(pool.clone())),
            revocations: Arc::new(postgres::RevocationRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Stores kept in process memory.
    ///
    /// `max_token_ttl` bounds how long a revoked token is remembered.
    #[must_use]
    pub fn memory(max_token_ttl: Duration) -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            users: store.clone(),
            products: store.clone(),
            orders: store,
            revocations: Arc::new(memory::MemoryRevocationStore::new(max_token_ttl)),
            pool: None,
        }
    }

    /// The connection pool, when backed by `PostgreSQL`.
    #[must_use]
    pub const fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}
