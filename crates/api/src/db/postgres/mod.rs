//! `PostgreSQL` implementations of the store traits.
//!
//! Queries are checked at runtime so the crate builds without a live
//! database.

mod orders;
mod products;
mod revocations;
mod users;

pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use revocations::RevocationRepository;
pub use users::UserRepository;

use super::RepositoryError;

/// Convert a non-negative `INTEGER` column to a count.
fn to_count(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a count to an `INTEGER` parameter.
fn to_db_int(value: u32, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}
