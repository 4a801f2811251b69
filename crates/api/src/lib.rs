//! Courier API server library.
//!
//! Exposes config, state, error handling, routes and background jobs so the
//! binary entrypoint and integration tests share the same building blocks.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
