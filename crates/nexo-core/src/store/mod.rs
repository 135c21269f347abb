//! Record stores
//!
//! A record store is the durability sink behind the session: a key-value
//! medium with a shared namespace (visible to every user) and a private one
//! (scoped to the current user). Stores never fail loudly. A read that
//! cannot be served is `None`, a write that cannot be made is `false`, and
//! the reason goes to the log.

mod file;
mod memory;
mod offline;
mod remote;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use offline::OfflineStore;
pub use remote::RemoteStore;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::api::{ApiClient, ApiService, HttpTransport, LocalTransport};
use crate::config::{Config, StoreBackend};

/// Key holding every review, in the shared namespace
pub const REVIEWS_KEY: &str = "reviews-shared";

/// Key holding the current user's library, in the private namespace
pub const LIBRARY_KEY: &str = "my-library";

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name for logs and status output
    fn name(&self) -> &'static str;

    /// Whether the medium can be used at all right now
    async fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str, shared: bool) -> Option<String>;

    /// Store `value` under `key`, returning whether the medium acknowledged it
    async fn set(&self, key: &str, value: &str, shared: bool) -> bool;
}

/// Open the record store selected by the configuration
pub fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.store {
        StoreBackend::File => Arc::new(FileStore::new(config.records_dir(), &config.user_id)),
        StoreBackend::Remote => {
            let url = config
                .api_url
                .as_deref()
                .context("The remote store needs api_url. Set it with: nexo config set api_url <url>")?;
            let transport = HttpTransport::new(url, config.store_timeout())
                .with_context(|| format!("Failed to set up HTTP client for {}", url))?;
            Arc::new(RemoteStore::new(ApiClient::new(transport), &config.user_id))
        }
        StoreBackend::Embedded => {
            let path = config.sqlite_path();
            let service = ApiService::open(&path)
                .with_context(|| format!("Failed to open document database {:?}", path))?
                .with_date_format(&config.date_format);
            let transport = LocalTransport::new(Arc::new(service));
            Arc::new(RemoteStore::new(ApiClient::new(transport), &config.user_id))
        }
        StoreBackend::Offline => Arc::new(OfflineStore),
    };

    tracing::debug!("Using {} record store", store.name());
    Ok(store)
}
