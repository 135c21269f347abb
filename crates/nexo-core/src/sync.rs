//! Sync controller
//!
//! Owns the domain cache and keeps the record store up to date with it.
//! This is a write-through cache with best-effort durability: every command
//! mutates the cache first and then persists a snapshot of the whole
//! collection. A store that is missing, refuses the write, or does not
//! answer in time degrades the outcome but never undoes the mutation.
//!
//! ## Usage
//!
//! ```ignore
//! let mut sync = SyncController::new(open_store(&config)?);
//! sync.load_all().await;
//!
//! let submitted = sync.submit_review(draft, session.as_ref()).await?;
//! if let PersistOutcome::Degraded(reason) = submitted.outcome {
//!     eprintln!("Saved locally only: {}", reason);
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::DomainCache;
use crate::error::{CommandError, ValidationError};
use crate::models::{
    local_date, Category, CategoryCounts, Library, LibraryEntry, LibraryEntryDraft, RecordId,
    Review, ReviewDraft, Session, DEFAULT_DATE_FORMAT,
};
use crate::store::{RecordStore, LIBRARY_KEY, REVIEWS_KEY};

/// Default bound on a single store call
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether the session has attempted its initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No load attempted yet
    Unsynced,
    /// Load attempted, whatever it found
    SyncedOrDegraded,
}

/// Why a persist did not reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradedReason {
    /// No medium to write to
    Unavailable,
    /// The medium was reachable but declined the write
    Rejected,
    /// The medium did not answer in time
    TimedOut,
}

impl DegradedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradedReason::Unavailable => "unavailable",
            DegradedReason::Rejected => "rejected",
            DegradedReason::TimedOut => "timed-out",
        }
    }
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DegradedReason::Unavailable => "storage is unavailable",
            DegradedReason::Rejected => "storage declined the write",
            DegradedReason::TimedOut => "storage did not respond in time",
        };
        f.write_str(text)
    }
}

/// Result of writing a collection to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    Degraded(DegradedReason),
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistOutcome::Persisted)
    }
}

/// A review accepted by the session
#[derive(Debug, Clone)]
pub struct ReviewSubmitted {
    pub review: Review,
    pub outcome: PersistOutcome,
}

/// A library entry accepted by the session
#[derive(Debug, Clone)]
pub struct EntryAdded {
    pub category: Category,
    pub entry: LibraryEntry,
    pub counts: CategoryCounts,
    pub outcome: PersistOutcome,
}

/// What a single read from the store turned up
enum Fetched<T> {
    Found(T),
    /// Absent, unreachable or too slow
    Missing,
    Corrupted,
}

/// Session context: the domain cache plus its durability sink
pub struct SyncController {
    store: Arc<dyn RecordStore>,
    cache: DomainCache,
    state: SyncState,
    timeout: Duration,
    date_format: String,
}

impl SyncController {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: DomainCache::new(),
            state: SyncState::Unsynced,
            timeout: DEFAULT_TIMEOUT,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Bound every store call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// chrono format for the dates stamped on new records
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn cache(&self) -> &DomainCache {
        &self.cache
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Whether the store reports a usable medium right now
    pub async fn store_available(&self) -> bool {
        timeout(self.timeout, self.store.is_available())
            .await
            .unwrap_or(false)
    }

    // ==================== Loading ====================

    /// Load both collections from the store
    ///
    /// A stored value replaces the cached collection and a corrupted one
    /// resets it to empty. A missing value, an unavailable store or a read
    /// that times out leaves the cached collection as it is, so calling
    /// this again never drops changes the session already made.
    pub async fn load_all(&mut self) {
        match self.fetch::<Vec<Review>>(REVIEWS_KEY, true).await {
            Fetched::Found(reviews) => self.cache.replace_reviews(reviews),
            Fetched::Corrupted => self.cache.replace_reviews(Vec::new()),
            Fetched::Missing => {}
        }
        match self.fetch::<Library>(LIBRARY_KEY, false).await {
            Fetched::Found(library) => self.cache.replace_library(library),
            Fetched::Corrupted => self.cache.replace_library(Library::new()),
            Fetched::Missing => {}
        }

        info!(
            "Loaded {} reviews and {} library entries from {} store",
            self.cache.reviews().len(),
            self.cache.library().len(),
            self.store.name()
        );
        self.state = SyncState::SyncedOrDegraded;
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str, shared: bool) -> Fetched<T> {
        let raw = match timeout(self.timeout, self.store.get(key, shared)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored value for {}", key);
                return Fetched::Missing;
            }
            Err(_) => {
                warn!("Timed out reading {}, keeping what is in memory", key);
                return Fetched::Missing;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Fetched::Found(value),
            Err(e) => {
                warn!("Stored {} is corrupted ({}), starting empty", key, e);
                Fetched::Corrupted
            }
        }
    }

    // ==================== Persisting ====================

    /// Write the full review collection to the store
    pub async fn persist_reviews(&self) -> PersistOutcome {
        self.persist(REVIEWS_KEY, self.cache.reviews(), true).await
    }

    /// Write the full library to the store
    pub async fn persist_library(&self) -> PersistOutcome {
        self.persist(LIBRARY_KEY, self.cache.library(), false).await
    }

    async fn persist<T: Serialize + ?Sized>(
        &self,
        key: &str,
        snapshot: &T,
        shared: bool,
    ) -> PersistOutcome {
        let outcome = self.try_persist(key, snapshot, shared).await;
        match outcome {
            PersistOutcome::Persisted => info!("Saved {}", key),
            PersistOutcome::Degraded(reason) => {
                warn!("Could not save {}: {}; keeping changes in memory", key, reason)
            }
        }
        outcome
    }

    async fn try_persist<T: Serialize + ?Sized>(
        &self,
        key: &str,
        snapshot: &T,
        shared: bool,
    ) -> PersistOutcome {
        use DegradedReason::*;

        let value = match serde_json::to_string(snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not encode {}: {}", key, e);
                return PersistOutcome::Degraded(Rejected);
            }
        };

        let attempt = async {
            if !self.store.is_available().await {
                return PersistOutcome::Degraded(Unavailable);
            }
            if self.store.set(key, &value, shared).await {
                PersistOutcome::Persisted
            } else {
                PersistOutcome::Degraded(Rejected)
            }
        };

        timeout(self.timeout, attempt)
            .await
            .unwrap_or(PersistOutcome::Degraded(TimedOut))
    }

    // ==================== Commands ====================

    /// Validate and add a review, then persist the review collection
    ///
    /// A rejected draft leaves the cache and the store untouched.
    pub async fn submit_review(
        &mut self,
        draft: ReviewDraft,
        session: Option<&Session>,
    ) -> Result<ReviewSubmitted, ValidationError> {
        let review = draft.into_review(
            RecordId::generate(),
            Session::author_name(session),
            local_date(&self.date_format),
        )?;

        let review = self.cache.add_review(review).clone();
        debug!("Added review {} for '{}'", review.id, review.subject);

        let outcome = self.persist_reviews().await;
        Ok(ReviewSubmitted { review, outcome })
    }

    /// Validate and add a library entry, then persist the library
    pub async fn add_library_entry(
        &mut self,
        category: Category,
        draft: LibraryEntryDraft,
        session: Option<&Session>,
    ) -> Result<EntryAdded, ValidationError> {
        let entry = draft.into_entry(category, RecordId::generate(), local_date(&self.date_format))?;

        let entry = self.cache.add_library_entry(category, entry).clone();
        debug!(
            "Added '{}' to {} for {}",
            entry.name,
            category.collection_key(),
            session.map(|s| s.user_id.as_str()).unwrap_or("anonymous")
        );

        let outcome = self.persist_library().await;
        Ok(EntryAdded {
            category,
            entry,
            counts: self.cache.category_counts(),
            outcome,
        })
    }

    /// Remove a review, then persist the review collection
    pub async fn delete_review(&mut self, id: RecordId) -> Result<PersistOutcome, CommandError> {
        let removed = self
            .cache
            .remove_review(id)
            .ok_or(CommandError::ReviewNotFound(id.as_i64()))?;
        debug!("Removed review {} for '{}'", removed.id, removed.subject);

        Ok(self.persist_reviews().await)
    }
}
