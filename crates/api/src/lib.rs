//! Bazaar API library.
//!
//! This crate provides the JSON REST API as a library, allowing it to be
//! tested and reused. The binary in `main.rs` only adds process set-up.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
