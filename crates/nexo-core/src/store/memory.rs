//! In-process record store
//!
//! Holds values in two maps and can be switched offline, made to decline
//! writes, or slowed down, which makes it the store of choice for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::RecordStore;

#[derive(Default)]
pub struct MemoryStore {
    shared: Mutex<HashMap<String, String>>,
    private: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
    decline_writes: AtomicBool,
    delay_ms: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without going through `set`
    pub fn with_value(self, key: &str, value: &str, shared: bool) -> Self {
        self.namespace(shared)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_decline_writes(&self, decline: bool) {
        self.decline_writes.store(decline, Ordering::SeqCst);
    }

    /// Delay every call by `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Current value under `key`, bypassing the offline switch
    pub fn value(&self, key: &str, shared: bool) -> Option<String> {
        self.namespace(shared)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Number of acknowledged writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn namespace(&self, shared: bool) -> &Mutex<HashMap<String, String>> {
        if shared {
            &self.shared
        } else {
            &self.private
        }
    }

    async fn wait(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn is_available(&self) -> bool {
        self.wait().await;
        !self.offline.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str, shared: bool) -> Option<String> {
        self.wait().await;
        if self.offline.load(Ordering::SeqCst) {
            return None;
        }
        self.value(key, shared)
    }

    async fn set(&self, key: &str, value: &str, shared: bool) -> bool {
        self.wait().await;
        if self.offline.load(Ordering::SeqCst) || self.decline_writes.load(Ordering::SeqCst) {
            return false;
        }
        self.namespace(shared)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let store = MemoryStore::new();
        assert!(store.set("k", "shared", true).await);
        assert!(store.set("k", "private", false).await);

        assert_eq!(store.get("k", true).await.as_deref(), Some("shared"));
        assert_eq!(store.get("k", false).await.as_deref(), Some("private"));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_offline_and_declining() {
        let store = MemoryStore::new().with_value("k", "v", true);

        store.set_offline(true);
        assert!(!store.is_available().await);
        assert!(store.get("k", true).await.is_none());
        assert!(!store.set("k", "w", true).await);

        store.set_offline(false);
        store.set_decline_writes(true);
        assert!(store.is_available().await);
        assert!(!store.set("k", "w", true).await);
        assert_eq!(store.value("k", true).as_deref(), Some("v"));
        assert_eq!(store.write_count(), 0);
    }
}
