//! Record store backed by the REST API
//!
//! Only the two well-known keys have a home on the server:
//!
//! - `reviews-shared` maps onto `/reviews`. Reads return the reviews oldest
//!   first (the order the session appends in). Writes post every review the
//!   server lacks and delete reviews this store has seen before but that
//!   are no longer in the written collection. Reviews other clients add in
//!   the meantime are left alone.
//! - `my-library` maps onto `/library/{userId}` and is replaced wholesale.
//!
//! Any other key is declined.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{RecordStore, LIBRARY_KEY, REVIEWS_KEY};
use crate::api::{ApiClient, ReviewSubmission, TransportError};
use crate::models::{Library, RecordId, Review};

pub struct RemoteStore {
    client: ApiClient,
    user_id: String,
    /// Review ids seen on the server through this store
    known_reviews: Mutex<HashSet<RecordId>>,
}

impl RemoteStore {
    pub fn new(client: ApiClient, user_id: &str) -> Self {
        Self {
            client,
            user_id: user_id.to_string(),
            known_reviews: Mutex::new(HashSet::new()),
        }
    }

    fn remember(&self, ids: impl IntoIterator<Item = RecordId>) {
        let mut known = self.known_reviews.lock().unwrap_or_else(|e| e.into_inner());
        known.clear();
        known.extend(ids);
    }

    fn known(&self) -> HashSet<RecordId> {
        self.known_reviews
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn load_reviews(&self) -> Result<String, TransportError> {
        let mut reviews = self.client.list_reviews().await?;
        self.remember(reviews.iter().map(|r| r.id));
        reviews.reverse();
        Ok(serde_json::to_string(&reviews)?)
    }

    async fn save_reviews(&self, reviews: &[Review]) -> Result<(), TransportError> {
        let on_server: HashSet<RecordId> = self
            .client
            .list_reviews()
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        let local: HashSet<RecordId> = reviews.iter().map(|r| r.id).collect();

        let mut created = 0;
        for review in reviews.iter().filter(|r| !on_server.contains(&r.id)) {
            self.client.create_review(&submission(review)).await?;
            created += 1;
        }

        let mut deleted = 0;
        for id in self.known() {
            if !local.contains(&id) && on_server.contains(&id) {
                self.client.delete_review(id).await?;
                deleted += 1;
            }
        }

        self.remember(local);
        if created > 0 || deleted > 0 {
            info!("Synced reviews: {} created, {} deleted", created, deleted);
        }
        Ok(())
    }

    async fn load_library(&self) -> Result<String, TransportError> {
        let doc = self.client.get_library(&self.user_id).await?;
        Ok(serde_json::to_string(&doc.library)?)
    }

    async fn save_library(&self, library: &Library) -> Result<(), TransportError> {
        self.client.replace_library(&self.user_id, library).await?;
        Ok(())
    }
}

fn submission(review: &Review) -> ReviewSubmission {
    ReviewSubmission {
        id: Some(review.id),
        subject: Some(review.subject.clone()),
        category: Some(review.category.as_str().to_string()),
        score: Some(i64::from(review.score.get())),
        body: Some(review.body.clone()),
        date: Some(review.date.clone()),
        author: Some(review.author.clone()),
        likes: Some(review.likes),
        section: Some(review.section.clone()),
        image_url: Some(review.image_url.clone()),
    }
}

fn log_failure(action: &str, key: &str, error: &TransportError) {
    if error.is_rejection() {
        warn!("Server refused to {} {}: {}", action, key, error);
    } else {
        warn!("Failed to {} {}: {}", action, key, error);
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn is_available(&self) -> bool {
        self.client.ping().await
    }

    async fn get(&self, key: &str, shared: bool) -> Option<String> {
        let result = match (key, shared) {
            (REVIEWS_KEY, true) => self.load_reviews().await,
            (LIBRARY_KEY, false) => self.load_library().await,
            _ => {
                debug!("No remote home for key {} (shared: {})", key, shared);
                return None;
            }
        };

        result.map_err(|e| log_failure("fetch", key, &e)).ok()
    }

    async fn set(&self, key: &str, value: &str, shared: bool) -> bool {
        let result = match (key, shared) {
            (REVIEWS_KEY, true) => match serde_json::from_str::<Vec<Review>>(value) {
                Ok(reviews) => self.save_reviews(&reviews).await,
                Err(e) => Err(e.into()),
            },
            (LIBRARY_KEY, false) => match serde_json::from_str::<Library>(value) {
                Ok(library) => self.save_library(&library).await,
                Err(e) => Err(e.into()),
            },
            _ => {
                debug!("Declining write to {} (shared: {})", key, shared);
                return false;
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                log_failure("save", key, &e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, ApiService, HttpTransport, LocalTransport, Transport};
    use crate::sync::{PersistOutcome, SyncController};
    use async_trait::async_trait;
    use serde_json::Value;
    use crate::models::{Category, ReviewDraft};
    use crate::storage::SqliteDocuments;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> Arc<ApiService> {
        Arc::new(ApiService::new(SqliteDocuments::open_in_memory().unwrap()))
    }

    fn store(service: &Arc<ApiService>) -> RemoteStore {
        RemoteStore::new(
            ApiClient::new(LocalTransport::new(Arc::clone(service))),
            "agustin",
        )
    }

    fn review(id: i64, subject: &str) -> Review {
        ReviewDraft {
            subject: subject.to_string(),
            category: Some(Category::Film),
            score: Some(3),
            body: "Fine".to_string(),
            section: "films".to_string(),
            image_url: None,
        }
        .into_review(RecordId(id), "Anonymous".to_string(), "2/3/2024".to_string())
        .unwrap()
    }

    #[tokio::test]
    async fn test_reviews_round_trip_oldest_first() {
        let service = service();
        let store = store(&service);
        let reviews = vec![review(1, "Alien"), review(2, "Heat")];

        assert!(store.is_available().await);
        assert!(store
            .set(REVIEWS_KEY, &serde_json::to_string(&reviews).unwrap(), true)
            .await);

        let loaded: Vec<Review> =
            serde_json::from_str(&store.get(REVIEWS_KEY, true).await.unwrap()).unwrap();
        assert_eq!(loaded, reviews);
    }

    #[tokio::test]
    async fn test_rewriting_reviews_is_idempotent() {
        let service = service();
        let store = store(&service);
        let value = serde_json::to_string(&vec![review(1, "Alien")]).unwrap();

        assert!(store.set(REVIEWS_KEY, &value, true).await);
        assert!(store.set(REVIEWS_KEY, &value, true).await);
        assert_eq!(service.list_reviews().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_removed_reviews_are_deleted_but_foreign_ones_kept() {
        let service = service();
        let store = store(&service);
        let both = vec![review(1, "Alien"), review(2, "Heat")];
        assert!(store
            .set(REVIEWS_KEY, &serde_json::to_string(&both).unwrap(), true)
            .await);

        // Another client adds a review this store never saw
        let other = self::store(&service);
        let foreign = serde_json::to_string(&vec![review(3, "Ran")]).unwrap();
        assert!(other.set(REVIEWS_KEY, &foreign, true).await);

        let only_first = serde_json::to_string(&vec![review(1, "Alien")]).unwrap();
        assert!(store.set(REVIEWS_KEY, &only_first, true).await);

        let mut ids: Vec<i64> = service
            .list_reviews()
            .unwrap()
            .iter()
            .map(|r| r.id.as_i64())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_library_round_trip() {
        let service = service();
        let store = store(&service);

        let empty: Library =
            serde_json::from_str(&store.get(LIBRARY_KEY, false).await.unwrap()).unwrap();
        assert!(empty.is_empty());

        let mut library = Library::new();
        library.anime.push(
            crate::models::LibraryEntryDraft::new("Mushishi", crate::models::Status::Completed)
                .into_entry(Category::Anime, RecordId(9), "1/1/2024".to_string())
                .unwrap(),
        );
        assert!(store
            .set(LIBRARY_KEY, &serde_json::to_string(&library).unwrap(), false)
            .await);
        assert_eq!(service.get_library("agustin").unwrap().library, library);
    }

    #[tokio::test]
    async fn test_unknown_keys_and_bad_values_declined() {
        let service = service();
        let store = store(&service);

        assert!(store.get("preferences", false).await.is_none());
        assert!(store.get(REVIEWS_KEY, false).await.is_none());
        assert!(!store.set(LIBRARY_KEY, "{}", true).await);
        assert!(!store.set(REVIEWS_KEY, "not json", true).await);
        assert!(!store.set(REVIEWS_KEY, "[{\"id\": 1}]", true).await);
    }

    /// A server that implements the REST routes but has nothing at `/`
    struct NoRootTransport(LocalTransport);

    #[async_trait]
    impl Transport for NoRootTransport {
        async fn send(
            &self,
            method: &str,
            path: &str,
            body: Option<Value>,
        ) -> Result<ApiResponse, TransportError> {
            if path == "/" {
                return Ok(ApiResponse::error(404, "not found"));
            }
            self.0.send(method, path, body).await
        }
    }

    #[tokio::test]
    async fn test_server_without_root_route_still_persists() {
        let service = service();
        let transport = NoRootTransport(LocalTransport::new(Arc::clone(&service)));
        let store = Arc::new(RemoteStore::new(ApiClient::new(transport), "agustin"));
        assert!(store.is_available().await);

        let mut sync = SyncController::new(store);
        sync.load_all().await;
        let added = sync
            .add_library_entry(
                Category::Game,
                crate::models::LibraryEntryDraft::new("Celeste", crate::models::Status::Completed),
                None,
            )
            .await
            .unwrap();

        assert_eq!(added.outcome, PersistOutcome::Persisted);
        assert_eq!(service.get_library("agustin").unwrap().library.games.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let transport =
            HttpTransport::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let store = RemoteStore::new(ApiClient::new(transport), "agustin");

        assert!(!store.is_available().await);
        assert!(store.get(REVIEWS_KEY, true).await.is_none());
        assert!(!store.set(REVIEWS_KEY, "[]", true).await);
    }
}
