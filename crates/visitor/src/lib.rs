//! Visitor counter.
//!
//! Talks to a key-value backend through the narrow [`KeyValueStore`]
//! capability interface (`Incr`, `LPush`, `LTrim`, `LRange`, `Get`, `Ping`).
//! [`VisitorCounter::connect`] probes the configured Redis backend exactly
//! once; if it is unreachable, the counter falls back to an in-memory store
//! for the rest of the process's life (no reconnect attempts). The most
//! recent 50 [`VisitRecord`]s are always retained in-process regardless of
//! which backend is active.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use audit_proto::VisitRecord;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::warn;

const RECENT_CAPACITY: usize = 50;
const VISIT_COUNT_KEY: &str = "cloudwatchman:visitors:count";
const VISIT_LIST_KEY: &str = "cloudwatchman:visitors:recent";

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The minimal Redis-shaped operation set the visitor counter needs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn incr(&self, key: &str) -> Result<i64, KvError>;
    async fn lpush(&self, key: &str, value: String) -> Result<(), KvError>;
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), KvError>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvError>;
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn ping(&self) -> Result<(), KvError>;
}

/// Redis-backed implementation, built over a `redis` multiplexed connection.
pub struct RedisStore {
    conn: Mutex<redis::aio::MultiplexedConnection>,
}

impl RedisStore {
    /// Opens a connection and pings it once; returns `Err` if either step
    /// fails so the caller can fall back to [`InMemoryStore`].
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(|e| KvError::Unreachable(e.to_string()))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KvError::Unreachable(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| KvError::Unreachable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.conn.lock().clone();
        redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn lpush(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut conn = self.conn.lock().clone();
        redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async::<i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), KvError> {
        let mut conn = self.conn.lock().clone();
        redis::cmd("LTRIM")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn.lock().clone();
        redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.lock().clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn ping(&self) -> Result<(), KvError> {
        let mut conn = self.conn.lock().clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}

/// Process-local fallback used once the configured Redis backend fails its
/// first connection attempt. Never errors.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    scalars: Mutex<HashMap<String, String>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let mut scalars = self.scalars.lock();
        let entry = scalars.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().unwrap_or(0) + 1;
        *entry = next.to_string();
        Ok(next)
    }

    async fn lpush(&self, key: &str, value: String) -> Result<(), KvError> {
        self.lists
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_front(value);
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), KvError> {
        let mut lists = self.lists.lock();
        if let Some(list) = lists.get_mut(key) {
            let len = list.len() as isize;
            let start = start.max(0).min(len) as usize;
            let stop = if stop < 0 { (len + stop + 1).max(0) } else { (stop + 1).min(len) } as usize;
            if start >= stop {
                list.clear();
            } else {
                let trimmed: VecDeque<String> = list.iter().skip(start).take(stop - start).cloned().collect();
                *list = trimmed;
            }
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvError> {
        let lists = self.lists.lock();
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let start = start.max(0).min(len) as usize;
        let stop = if stop < 0 { (len + stop + 1).max(0) } else { (stop + 1).min(len) } as usize;
        if start >= stop {
            return Ok(Vec::new());
        }
        Ok(list.iter().skip(start).take(stop - start).cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.scalars.lock().get(key).cloned())
    }

    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }
}

/// Which backend the counter ended up on after its one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    InMemory,
}

/// Tracks total dashboard visits and the most recent 50 [`VisitRecord`]s.
pub struct VisitorCounter {
    backend: Arc<dyn KeyValueStore>,
    backend_kind: BackendKind,
    recent: parking_lot::RwLock<VecDeque<VisitRecord>>,
    sequence: AtomicI64,
}

impl VisitorCounter {
    /// Tries `redis_url` once; falls back to an in-memory store if the
    /// connection or its initial PING fails. The fallback is sticky for the
    /// life of this counter.
    pub async fn connect(redis_url: &str) -> Self {
        match RedisStore::connect(redis_url).await {
            Ok(store) => {
                tracing::info!("visitor counter connected to redis");
                Self::with_backend(Arc::new(store), BackendKind::Redis)
            }
            Err(e) => {
                warn!(error = %e, "redis unavailable, falling back to in-memory visitor counter");
                Self::with_backend(Arc::new(InMemoryStore::default()), BackendKind::InMemory)
            }
        }
    }

    pub fn with_backend(backend: Arc<dyn KeyValueStore>, kind: BackendKind) -> Self {
        Self {
            backend,
            backend_kind: kind,
            recent: parking_lot::RwLock::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            sequence: AtomicI64::new(0),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    /// Records a visit: increments the backend counter, mirrors the record
    /// to the backend's capped list (best effort), and always keeps it in
    /// the in-process ring of the last 50 visits.
    pub async fn record_visit(&self, client_ip: impl Into<String>, user_agent: &str) -> i64 {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = VisitRecord::new(client_ip, user_agent, seq);

        let total = self.backend.incr(VISIT_COUNT_KEY).await.unwrap_or(seq);

        if let Ok(json) = serde_json::to_string(&record) {
            let _ = self.backend.lpush(VISIT_LIST_KEY, json).await;
            let _ = self
                .backend
                .ltrim(VISIT_LIST_KEY, 0, RECENT_CAPACITY as isize - 1)
                .await;
        }

        let mut recent = self.recent.write();
        if recent.len() == RECENT_CAPACITY {
            recent.pop_back();
        }
        recent.push_front(record);

        total
    }

    /// Total visits recorded, read straight from the backend.
    pub async fn total(&self) -> i64 {
        self.backend
            .get(VISIT_COUNT_KEY)
            .await
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// The last 50 visits, most recent first, served from the in-process
    /// ring regardless of backend.
    pub fn recent(&self) -> Vec<VisitRecord> {
        self.recent.read().iter().cloned().collect()
    }

    pub async fn ping(&self) -> bool {
        self.backend.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_incr_and_total() {
        let counter = VisitorCounter::with_backend(Arc::new(InMemoryStore::default()), BackendKind::InMemory);
        counter.record_visit("1.2.3.4", "curl/8").await;
        counter.record_visit("5.6.7.8", "curl/8").await;
        assert_eq!(counter.total().await, 2);
    }

    #[tokio::test]
    async fn test_recent_caps_at_50_regardless_of_backend() {
        let counter = VisitorCounter::with_backend(Arc::new(InMemoryStore::default()), BackendKind::InMemory);
        for i in 0..60 {
            counter.record_visit(format!("10.0.0.{i}"), "ua").await;
        }
        assert_eq!(counter.recent().len(), 50);
        assert_eq!(counter.recent()[0].client_ip, "10.0.0.59");
    }

    #[tokio::test]
    async fn test_ping_in_memory_always_succeeds() {
        let counter = VisitorCounter::with_backend(Arc::new(InMemoryStore::default()), BackendKind::InMemory);
        assert!(counter.ping().await);
    }

    #[tokio::test]
    async fn test_ltrim_and_lrange_semantics() {
        let store = InMemoryStore::default();
        for v in ["a", "b", "c", "d"] {
            store.lpush("k", v.to_string()).await.unwrap();
        }
        store.ltrim("k", 0, 1).await.unwrap();
        let range = store.lrange("k", 0, -1).await.unwrap();
        assert_eq!(range, vec!["d".to_string(), "c".to_string()]);
    }
}
