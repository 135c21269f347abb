//! Storage layer
//!
//! Server-side document database used by the REST API service.
//!
//! ## Architecture
//!
//! - **SQLite**: one table per collection, documents kept as JSON text
//! - **Schema**: versioned in `schema_info`, created on first open

pub mod documents;
pub mod error;
pub mod schema;

pub use documents::{LibraryDocument, SqliteDocuments};
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
