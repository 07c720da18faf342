//! configd-server: HTTP API, SSE event stream, and admin surface for the
//! configuration delivery service.
//!
//! This crate ties the store, cache, and broker crates together into a
//! running server. [`start`] initializes each dependency, builds the
//! router, and serves until a shutdown signal is received.

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::sync::Arc;

use configd_broker::EventBroker;
use configd_cache::{CacheCoordinator, InMemoryBackend, RedisBackend};
use configd_core::{Config, Result};
use configd_db::Store;

use crate::context::AppContext;

/// Start the configd server. Runs until the process receives a shutdown
/// signal (Ctrl+C or SIGTERM).
pub async fn start(config: Config) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let pool = configd_db::init_pool(&config.database.url)?;
    let store = Store::new(pool);

    let cache_backend: Box<dyn configd_cache::CacheBackend> =
        match RedisBackend::connect(&config.cache.connection_url()).await {
            Ok(backend) => {
                tracing::info!(host = %config.cache.host, port = config.cache.port, "connected to redis");
                Box::new(backend)
            }
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable at startup, falling back to in-memory cache");
                Box::new(InMemoryBackend::new())
            }
        };
    let cache = Arc::new(CacheCoordinator::new(cache_backend, config.cache.ttl));

    let broker = EventBroker::new();
    let config = Arc::new(config);
    let ctx = AppContext::new(store, cache, broker, config.clone());

    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .map_err(|e| configd_core::Error::Internal(format!("failed to bind {}: {e}", config.server.listen_addr)))?;

    tracing::info!(addr = %config.server.listen_addr, "configd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| configd_core::Error::Internal(format!("server error: {e}")))?;

    tracing::info!("configd shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
