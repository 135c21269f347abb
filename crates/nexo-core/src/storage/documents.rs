//! SQLite document database
//!
//! Server-side persistence behind the REST API: one reviews collection
//! shared by everyone and one library document per user. Documents are
//! stored as JSON text.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use crate::models::{Library, RecordId, Review};

/// A user's library as stored and served by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDocument {
    pub user_id: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub library: Library,
}

/// Document collections backed by a single SQLite connection
pub struct SqliteDocuments {
    conn: Mutex<Connection>,
}

impl SqliteDocuments {
    /// Open or create the database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    // ==================== Reviews ====================

    /// All reviews, newest first
    pub fn list_reviews(&self) -> StorageResult<Vec<Review>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT document FROM reviews ORDER BY created_at DESC, id DESC")?;
        let documents = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        documents
            .iter()
            .map(|doc| serde_json::from_str(doc).map_err(StorageError::from))
            .collect()
    }

    pub fn get_review(&self, id: RecordId) -> StorageResult<Option<Review>> {
        let conn = self.conn()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM reviews WHERE id = ?1",
                [id.as_i64()],
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| serde_json::from_str(&doc).map_err(StorageError::from))
            .transpose()
    }

    pub fn insert_review(&self, review: &Review, created_at: DateTime<Utc>) -> StorageResult<()> {
        let document = serde_json::to_string(review)?;
        self.conn()?.execute(
            "INSERT INTO reviews (id, created_at, document) VALUES (?1, ?2, ?3)",
            params![review.id.as_i64(), created_at.timestamp_millis(), document],
        )?;
        Ok(())
    }

    /// Delete a review, returning whether it existed
    pub fn delete_review(&self, id: RecordId) -> StorageResult<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM reviews WHERE id = ?1", [id.as_i64()])?;
        Ok(removed > 0)
    }

    // ==================== Libraries ====================

    pub fn get_library(&self, user_id: &str) -> StorageResult<Option<LibraryDocument>> {
        let conn = self.conn()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT updated_at, document FROM libraries WHERE user_id = ?1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((updated_at, document)) = row else {
            return Ok(None);
        };

        Ok(Some(LibraryDocument {
            user_id: user_id.to_string(),
            updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_default(),
            library: serde_json::from_str(&document)?,
        }))
    }

    /// Insert or replace a user's library
    pub fn put_library(&self, user_id: &str, library: &Library) -> StorageResult<LibraryDocument> {
        // Millisecond precision, matching what is read back
        let now = Utc::now();
        let updated_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let document = serde_json::to_string(library)?;

        self.conn()?.execute(
            "INSERT INTO libraries (user_id, updated_at, document) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                updated_at = excluded.updated_at,
                document = excluded.document",
            params![user_id, updated_at.timestamp_millis(), document],
        )?;

        Ok(LibraryDocument {
            user_id: user_id.to_string(),
            updated_at,
            library: library.clone(),
        })
    }
}
