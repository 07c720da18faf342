//! Application configuration types.
//!
//! The top-level [`Config`] struct is assembled from environment variables.
//! Every section defaults sensibly so a bare `Config::from_env()` with no
//! variables set still produces a runnable (if empty-backed) configuration.

use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub sse: SseConfig,
}

impl Config {
    /// Build configuration from the process environment, per the recognized
    /// variables: `DB_URL`, `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`,
    /// `REDIS_DB`, `CACHE_TTL`, `SSE_HEARTBEAT_SECONDS`, `HTTP_LISTEN_ADDR`.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            cache: CacheConfig::from_env(),
            sse: SseConfig::from_env(),
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.cache.ttl.is_zero() {
            warnings.push("CACHE_TTL is 0; cache entries will expire immediately".into());
        }
        if self.sse.heartbeat_interval.is_zero() {
            warnings.push("SSE_HEARTBEAT_SECONDS is 0; heartbeats will not keep connections alive".into());
        }
        if self.database.url.is_empty() {
            warnings.push("DB_URL is empty; falling back to a local sqlite file".into());
        }

        warnings
    }
}

/// HTTP server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            listen_addr: env_or("HTTP_LISTEN_ADDR", "0.0.0.0:8080"),
        }
    }
}

/// Backing relational store configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl DatabaseConfig {
    fn from_env() -> Self {
        Self {
            url: env_or("DB_URL", "configd.db"),
        }
    }
}

/// Distributed cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub ttl: Duration,
}

impl CacheConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("REDIS_HOST", "127.0.0.1"),
            port: env_parse_or("REDIS_PORT", 6379),
            password: std::env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
            db: env_parse_or("REDIS_DB", 0),
            ttl: Duration::from_secs(env_parse_or("CACHE_TTL", 300)),
        }
    }

    /// Build a `redis://` connection URL from the parsed fields.
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{pw}@{}:{}/{}", self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// SSE endpoint configuration.
#[derive(Debug, Clone)]
pub struct SseConfig {
    pub heartbeat_interval: Duration,
}

impl SseConfig {
    fn from_env() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(env_parse_or("SSE_HEARTBEAT_SECONDS", 30)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        // SAFETY: test-only env isolation is not guaranteed across the test
        // binary, so this only checks shape, not exact values.
        let config = Config {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8080".into(),
            },
            database: DatabaseConfig {
                url: "configd.db".into(),
            },
            cache: CacheConfig {
                host: "127.0.0.1".into(),
                port: 6379,
                password: None,
                db: 0,
                ttl: Duration::from_secs(300),
            },
            sse: SseConfig {
                heartbeat_interval: Duration::from_secs(30),
            },
        };
        assert!(config.validate().is_empty());
    }

    #[test]
    fn connection_url_without_password() {
        let cache = CacheConfig {
            host: "cache.internal".into(),
            port: 6380,
            password: None,
            db: 2,
            ttl: Duration::from_secs(60),
        };
        assert_eq!(cache.connection_url(), "redis://cache.internal:6380/2");
    }

    #[test]
    fn connection_url_with_password() {
        let cache = CacheConfig {
            host: "cache.internal".into(),
            port: 6380,
            password: Some("secret".into()),
            db: 0,
            ttl: Duration::from_secs(60),
        };
        assert_eq!(
            cache.connection_url(),
            "redis://:secret@cache.internal:6380/0"
        );
    }

    #[test]
    fn zero_ttl_warns() {
        let config = Config {
            server: ServerConfig { listen_addr: "x".into() },
            database: DatabaseConfig { url: "x".into() },
            cache: CacheConfig {
                host: "x".into(),
                port: 1,
                password: None,
                db: 0,
                ttl: Duration::from_secs(0),
            },
            sse: SseConfig { heartbeat_interval: Duration::from_secs(30) },
        };
        assert!(config.validate().iter().any(|w| w.contains("CACHE_TTL")));
    }
}
