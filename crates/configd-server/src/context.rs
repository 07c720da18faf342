//! Application context shared across all route handlers via Axum state.

use std::sync::Arc;
use std::time::Duration;

use configd_broker::EventBroker;
use configd_cache::CacheCoordinator;
use configd_core::Config;
use configd_db::Store;

/// Cheaply cloneable: every field is an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<Store>,
    pub cache: Arc<CacheCoordinator>,
    pub broker: Arc<EventBroker>,
    pub config: Arc<Config>,
}

impl AppContext {
    pub fn new(
        store: Arc<Store>,
        cache: Arc<CacheCoordinator>,
        broker: Arc<EventBroker>,
        config: Arc<Config>,
    ) -> Self {
        Self { store, cache, broker, config }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.config.sse.heartbeat_interval
    }
}
