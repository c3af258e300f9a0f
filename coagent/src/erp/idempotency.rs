//! Idempotency cache for ERP write operations.
//!
//! Keyed by an adapter-instance UUID plus a stable digest of
//! `(method, doctype, payload)`; a repeated write within the TTL returns the
//! cached result and makes no network call. Stale entries are swept on write
//! paths.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

struct CacheEntry {
    stored_at: Instant,
    result: Value,
}

/// Short-lived write-result cache; one per ERP adapter instance.
pub struct IdempotencyCache {
    namespace: Uuid,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            namespace: Uuid::new_v4(),
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for one write. The namespace isolates adapter instances;
    /// the digest is stable for identical `(method, doctype, payload)`.
    pub fn key(&self, method: &str, doctype: &str, payload: &Value) -> String {
        let mut hasher = DefaultHasher::new();
        method.hash(&mut hasher);
        doctype.hash(&mut hasher);
        serde_json::to_string(payload)
            .unwrap_or_default()
            .hash(&mut hasher);
        format!("{}:{:016x}", self.namespace, hasher.finish())
    }

    /// Cached result for `key`, if fresh.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() <= self.ttl)
            .map(|e| e.result.clone())
    }

    /// Stores a write result, sweeping stale entries first.
    pub async fn put(&self, key: String, result: Value) {
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, e| e.stored_at.elapsed() <= ttl);
        entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                result,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: Identical writes share a key; any differing component
    /// changes it.
    #[tokio::test]
    async fn keys_are_stable_and_distinct() {
        let cache = IdempotencyCache::new(Duration::from_secs(300));
        let payload = json!({"guest_name": "John", "room": "101"});
        let a = cache.key("create", "Reservation", &payload);
        let b = cache.key("create", "Reservation", &payload);
        assert_eq!(a, b);

        assert_ne!(a, cache.key("update", "Reservation", &payload));
        assert_ne!(a, cache.key("create", "Invoice", &payload));
        assert_ne!(a, cache.key("create", "Reservation", &json!({"guest_name": "Jane"})));
    }

    /// **Scenario**: Two adapter instances never share cache keys.
    #[tokio::test]
    async fn namespaces_isolate_instances() {
        let payload = json!({"x": 1});
        let a = IdempotencyCache::new(Duration::from_secs(300));
        let b = IdempotencyCache::new(Duration::from_secs(300));
        assert_ne!(
            a.key("create", "Room", &payload),
            b.key("create", "Room", &payload)
        );
    }

    /// **Scenario**: Entries expire after the TTL and are swept on write.
    #[tokio::test]
    async fn entries_expire() {
        let cache = IdempotencyCache::new(Duration::from_millis(10));
        let key = cache.key("create", "Room", &json!({}));
        cache.put(key.clone(), json!({"name": "R1"})).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&key).await.is_none());

        cache.put("other".into(), json!({})).await;
        assert_eq!(cache.len().await, 1);
    }
}
