//! Record store with no medium
//!
//! Selected with `store = "offline"`: the session works from memory only.

use async_trait::async_trait;

use super::RecordStore;

/// A store with no medium behind it
///
/// Used when persistence is turned off; every write reports unavailable.
pub struct OfflineStore;

#[async_trait]
impl RecordStore for OfflineStore {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str, _shared: bool) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str, _shared: bool) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_available() {
        let store = OfflineStore;
        assert!(!store.is_available().await);
        assert!(!store.set("k", "v", true).await);
        assert!(store.get("k", true).await.is_none());
    }
}
