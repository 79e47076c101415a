//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `api` - JSON REST server (auth, catalog, orders)
//! - `cli` - Command-line tools for migrations and admin bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP. The optional `postgres` feature adds sqlx encode/decode
//! implementations so the same types can be bound to queries directly.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, and the fixed enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
