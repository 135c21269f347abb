//! File-backed record store
//!
//! Each key is a JSON file under the records directory:
//!
//! - `shared/<key>.json` for the shared namespace
//! - `private/<user_id>/<key>.json` for the current user
//!
//! Writes are atomic (write to temp file, then rename). File I/O runs on
//! the blocking pool, so callers' timeouts still fire on a stalled disk.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::RecordStore;
use crate::storage::{StorageError, StorageResult};

pub struct FileStore {
    root: PathBuf,
    user_id: String,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, user_id: &str) -> Self {
        Self {
            root: root.into(),
            user_id: user_id.to_string(),
        }
    }

    /// Location of the file backing `key`
    pub fn path_for(&self, key: &str, shared: bool) -> PathBuf {
        let file_name = format!("{}.json", sanitize(key));
        if shared {
            self.root.join("shared").join(file_name)
        } else {
            self.root
                .join("private")
                .join(sanitize(&self.user_id))
                .join(file_name)
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn is_available(&self) -> bool {
        let root = self.root.clone();
        let result = blocking(move || {
            fs::create_dir_all(&root)
                .map_err(|source| StorageError::CreateDirectory { path: root, source })
        })
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Records directory {:?} is unusable: {}", self.root, e);
                false
            }
        }
    }

    async fn get(&self, key: &str, shared: bool) -> Option<String> {
        let path = self.path_for(key, shared);
        match blocking(move || read(path)).await {
            Ok(value) => {
                debug!("Read {} ({})", key, if value.is_some() { "present" } else { "absent" });
                value
            }
            Err(e) => {
                warn!("Could not read {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, shared: bool) -> bool {
        let path = self.path_for(key, shared);
        let target = path.clone();
        let data = value.as_bytes().to_vec();
        match blocking(move || atomic_write(&target, &data)).await {
            Ok(()) => {
                debug!("Wrote {} to {:?}", key, path);
                true
            }
            Err(e) => {
                warn!("Could not write {}: {}", key, e);
                false
            }
        }
    }
}

/// Run file I/O on the blocking pool
async fn blocking<T, F>(task: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await?
}

fn read(path: PathBuf) -> StorageResult<Option<String>> {
    match fs::read_to_string(&path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::ReadError { path, source }),
    }
}

/// Keep keys and user ids to a single safe path component
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write data to a file atomically
///
/// The temp file lives next to the target so the rename stays on one
/// filesystem.
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("json.tmp");
    let write_err = |source| StorageError::WriteError {
        path: temp_path.clone(),
        source,
    };

    let mut file = File::create(&temp_path).map_err(write_err)?;
    file.write_all(data).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path(), "agustin");

        assert!(store.get("reviews-shared", true).await.is_none());
        assert!(store.set("reviews-shared", "[]", true).await);
        assert_eq!(store.get("reviews-shared", true).await.as_deref(), Some("[]"));

        assert!(temp_dir.path().join("shared/reviews-shared.json").exists());
        assert!(!temp_dir.path().join("shared/reviews-shared.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_private_namespace_is_per_user() {
        let temp_dir = TempDir::new().unwrap();
        let alice = FileStore::new(temp_dir.path(), "alice");
        let bob = FileStore::new(temp_dir.path(), "bob");

        assert!(alice.set("my-library", "{\"games\":[]}", false).await);
        assert!(bob.get("my-library", false).await.is_none());
        assert!(alice.get("my-library", true).await.is_none());
        assert!(temp_dir
            .path()
            .join("private/alice/my-library.json")
            .exists());
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let store = FileStore::new("/data", "../../etc");
        let path = store.path_for("../passwd", false);
        assert!(path.starts_with("/data/private"));
        assert_eq!(path.file_name().unwrap(), "___passwd.json");
        assert_eq!(sanitize(""), "_");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stalled_read_does_not_block_timeout() {
        use std::process::Command;
        use std::time::Duration;

        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path(), "u");
        let path = store.path_for("reviews-shared", true);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Opening a FIFO for reading waits until a writer shows up
        let made = Command::new("mkfifo").arg(&path).status();
        if !matches!(made, Ok(status) if status.success()) {
            return;
        }

        let read = tokio::time::timeout(
            Duration::from_millis(100),
            store.get("reviews-shared", true),
        )
        .await;
        assert!(read.is_err());

        // Release the reader still parked on the blocking pool
        drop(fs::OpenOptions::new().write(true).open(&path).unwrap());
    }

    #[tokio::test]
    async fn test_unusable_root_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let store = FileStore::new(blocker.join("records"), "u");
        assert!(!store.is_available().await);
        assert!(!store.set("k", "v", true).await);
        assert!(store.get("k", true).await.is_none());
    }
}
