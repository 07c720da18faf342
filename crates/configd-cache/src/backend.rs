//! Pluggable cache transport.
//!
//! [`RedisBackend`] is the production transport. [`InMemoryBackend`] backs
//! tests (and could back a single-process deployment) without requiring a
//! live Redis server.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use configd_core::{Error, Result};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Keys matching a glob-style `pattern` (`*`, `?`, `[...]`).
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>>;
}

/// Redis-backed transport. Uses [`ConnectionManager`], which reconnects
/// transparently on connection loss rather than surfacing every blip as an
/// error.
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| Error::Unavailable(e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, secs)
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(|e| Error::Unavailable(e.to_string()))?;
            found.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(found)
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: std::time::Instant,
}

/// In-memory transport for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    fail_next: Mutex<bool>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation return an error, to exercise the
    /// cache-error-is-never-fatal contract in tests.
    pub fn fail_next_call(&self) {
        *self.fail_next.lock() = true;
    }

    fn maybe_fail(&self) -> Result<()> {
        let mut flag = self.fail_next.lock();
        if *flag {
            *flag = false;
            return Err(Error::Unavailable("simulated cache failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.maybe_fail()?;
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > std::time::Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.maybe_fail()?;
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: std::time::Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.maybe_fail()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.maybe_fail()?;
        let glob = glob::Pattern::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("invalid pattern: {e}")))?;
        let entries = self.entries.lock();
        Ok(entries.keys().filter(|k| glob.matches(k)).cloned().collect())
    }
}
