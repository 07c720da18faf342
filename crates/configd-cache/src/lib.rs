//! Cache coordinator sitting in front of the durable store.
//!
//! Backed by Redis in production; an in-memory transport is available for
//! tests and single-process deployments that don't want the dependency.

pub mod backend;
pub mod coordinator;

pub use backend::{CacheBackend, InMemoryBackend, RedisBackend};
pub use coordinator::{key_by_api_key, key_by_slugs, CacheCoordinator, Stats, DEFAULT_TTL};
