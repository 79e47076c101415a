//! Business logic for the store.
//!
//! # Services
//!
//! - [`auth`] - registration, login, bearer tokens, password recovery
//! - [`users`] - user listing, profiles, account status
//! - [`catalog`] - product CRUD and ratings
//! - [`orders`] - order placement with stock reservation, and cancellation
//!
//! Services borrow their stores from [`crate::db::Storage`] and are cheap to
//! construct per request (see [`crate::state::AppState`]).

pub mod auth;
pub mod catalog;
pub mod orders;
pub mod users;

pub use auth::{AuthError, AuthService, AuthSession};
pub use catalog::{CatalogError, CatalogService};
pub use orders::{OrderError, OrderService};
pub use users::{UserError, UserService};
