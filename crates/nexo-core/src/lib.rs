//! Nexo Core Library
//!
//! This crate provides the core of Nexo, a small community catalogue for
//! reviewing video games, anime, films and series and keeping a personal
//! library of them.
//!
//! # Architecture
//!
//! - **Domain cache**: in-memory source of truth for the running session
//! - **Record store**: key-value durability sink (files, REST API, memory)
//! - **Sync controller**: validates commands, mutates the cache, persists
//!   snapshots and reports whether the store kept up
//!
//! The REST API side (`api`, `storage`) serves the same data from a SQLite
//! document database.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut sync = SyncController::new(open_store(&config)?);
//! sync.load_all().await;
//!
//! let submitted = sync.submit_review(draft, None).await?;
//! println!("{:?}", submitted.outcome);
//! ```
//!
//! # Modules
//!
//! - `sync`: Sync controller (main entry point)
//! - `cache`: Domain cache
//! - `store`: Record store trait and implementations
//! - `models`: Reviews, library entries and value types
//! - `api`: REST service and client
//! - `storage`: SQLite document database
//! - `config`: Application configuration

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

pub use cache::DomainCache;
pub use config::{Config, StoreBackend};
pub use error::{CommandError, ParseError, ValidationError};
pub use models::{
    Category, CategoryCounts, Library, LibraryEntry, LibraryEntryDraft, RecordId, Review,
    ReviewDraft, Score, Session, Status,
};
pub use storage::StorageError;
pub use store::{open_store, RecordStore};
pub use sync::{DegradedReason, EntryAdded, PersistOutcome, ReviewSubmitted, SyncController, SyncState};
