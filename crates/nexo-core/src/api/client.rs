//! API client
//!
//! Typed calls against the REST surface. The wire is abstracted behind
//! [`Transport`] so the same client talks to a remote server over HTTP or to
//! an in-process [`ApiService`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{ApiResponse, ApiService, EntrySubmission, Envelope, ReviewSubmission};
use crate::models::{Category, Library, RecordId, Review};
use crate::storage::LibraryDocument;

/// Errors from talking to the API
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response carried no data")]
    MissingData,
}

impl TransportError {
    /// True when the server answered and refused the request
    pub fn is_rejection(&self) -> bool {
        matches!(self, TransportError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Carries one request to the API and returns its response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, TransportError>;
}

/// Transport over HTTP
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nexo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| {
            TransportError::Status {
                status: 405,
                message: format!("unsupported method {}", method),
            }
        })?;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        // Non-JSON bodies (proxy error pages) leave the status to speak
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        Ok(ApiResponse { status, body })
    }
}

/// Transport that calls an [`ApiService`] in-process
#[derive(Clone)]
pub struct LocalTransport {
    service: Arc<ApiService>,
}

impl LocalTransport {
    pub fn new(service: Arc<ApiService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, TransportError> {
        let body = body.map(|b| b.to_string());
        Ok(self.service.handle(method, path, body.as_deref()))
    }
}

/// Typed client for the REST API
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Whether the API answers at all
    ///
    /// Any response counts, whatever its status; only a failure to reach
    /// the server makes it unavailable.
    pub async fn ping(&self) -> bool {
        match self.transport.send("GET", "/", None).await {
            Ok(response) => {
                debug!("API answered ping with {}", response.status);
                true
            }
            Err(e) => {
                debug!("API unreachable: {}", e);
                false
            }
        }
    }

    /// All reviews, newest first
    pub async fn list_reviews(&self) -> Result<Vec<Review>, TransportError> {
        self.request("GET", "/reviews", None).await
    }

    pub async fn create_review(
        &self,
        submission: &ReviewSubmission,
    ) -> Result<Review, TransportError> {
        let body = serde_json::to_value(submission)?;
        self.request("POST", "/reviews", Some(body)).await
    }

    pub async fn delete_review(&self, id: RecordId) -> Result<(), TransportError> {
        let path = format!("/reviews/{}", id);
        let envelope = self.envelope("DELETE", &path, None).await?;
        debug!(
            "Delete review {}: {}",
            id,
            envelope.message.unwrap_or_default()
        );
        Ok(())
    }

    /// Fetch a library; the server creates an empty one on first access
    pub async fn get_library(&self, user_id: &str) -> Result<LibraryDocument, TransportError> {
        self.request("GET", &library_path(user_id), None).await
    }

    pub async fn replace_library(
        &self,
        user_id: &str,
        library: &Library,
    ) -> Result<LibraryDocument, TransportError> {
        let body = serde_json::to_value(library)?;
        self.request("PUT", &library_path(user_id), Some(body))
            .await
    }

    pub async fn append_entry(
        &self,
        user_id: &str,
        category: Category,
        entry: &EntrySubmission,
    ) -> Result<LibraryDocument, TransportError> {
        let path = format!("{}/{}", library_path(user_id), category.collection_key());
        let body = serde_json::to_value(entry)?;
        self.request("POST", &path, Some(body)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, TransportError> {
        let envelope = self.envelope(method, path, body).await?;
        let data = envelope.data.ok_or(TransportError::MissingData)?;
        Ok(serde_json::from_value(data)?)
    }

    async fn envelope(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope<Value>, TransportError> {
        let response = self.transport.send(method, path, body).await?;
        let ok = response.is_success();

        // Error bodies are not always envelopes (proxies, crashed servers)
        let envelope: Option<Envelope<Value>> = serde_json::from_value(response.body).ok();

        match envelope {
            Some(envelope) if ok && envelope.success => Ok(envelope),
            Some(envelope) => Err(TransportError::Status {
                status: response.status,
                message: envelope
                    .error
                    .or(envelope.message)
                    .unwrap_or_else(|| "request failed".to_string()),
            }),
            None if ok => Err(TransportError::MissingData),
            None => Err(TransportError::Status {
                status: response.status,
                message: "request failed".to_string(),
            }),
        }
    }
}

/// Path of a user's library; the id is percent-encoded into one segment
fn library_path(user_id: &str) -> String {
    format!("/library/{}", urlencoding::encode(user_id))
}
