//! Read-only HTTP query surface over the indexed log store.

pub mod cache;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
