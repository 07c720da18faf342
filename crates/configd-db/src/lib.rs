//! SQLite-backed storage for the configuration delivery service.
//!
//! Exposes [`Store`] as the only entry point callers outside this crate
//! should need; the `queries` module is `pub` for fine-grained access in
//! tests and migrations tooling.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
pub use store::Store;
