//! REST API for the server-backed variant
//!
//! The service side answers requests against the SQLite document database;
//! the client side speaks the same surface either over HTTP or in-process.
//!
//! ## Routes
//!
//! | Method | Path                           | Data                 |
//! |--------|--------------------------------|----------------------|
//! | GET    | `/reviews`                     | reviews, newest first|
//! | POST   | `/reviews`                     | created review       |
//! | DELETE | `/reviews/{id}`                | (message only)       |
//! | GET    | `/library/{userId}`            | library (created lazily) |
//! | PUT    | `/library/{userId}`            | replaced library     |
//! | POST   | `/library/{userId}/{category}` | library after append |
//!
//! Every response is an envelope: `{success: true, data}` or
//! `{success: true, message}` on success, `{success: false, error}` with a
//! non-2xx status otherwise.

mod client;
mod service;

pub use client::{ApiClient, HttpTransport, LocalTransport, Transport, TransportError};
pub use service::{ApiService, EntrySubmission, ReviewSubmission};

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::ValidationError;
use crate::storage::StorageError;

/// Status code and JSON body of an API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// `200 {success: true, data}`
    pub fn data(data: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "success": true, "data": data }),
        }
    }

    /// `200 {success: true, message}`
    pub fn message(message: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "success": true, "message": message }),
        }
    }

    /// `{success: false, error}` with the given status
    pub fn error(status: u16, error: &str) -> Self {
        Self {
            status,
            body: json!({ "success": false, "error": error }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Response envelope as seen by clients
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Errors raised while handling an API request
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Invalid category '{0}'")]
    UnknownCategory(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Route not found: {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) | ApiError::UnknownCategory(_) | ApiError::Validation(_) => {
                400
            }
            ApiError::RouteNotFound { .. } => 404,
            ApiError::Encode(_) | ApiError::Storage(_) => 500,
        }
    }
}

impl From<ApiError> for ApiResponse {
    fn from(error: ApiError) -> Self {
        ApiResponse::error(error.status(), &error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelopes() {
        let ok = ApiResponse::data(json!([1, 2]));
        assert!(ok.is_success());
        assert_eq!(ok.body["success"], true);
        assert_eq!(ok.body["data"][1], 2);

        let err = ApiResponse::error(400, "bad");
        assert!(!err.is_success());
        assert_eq!(err.body, json!({"success": false, "error": "bad"}));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::UnknownCategory("books".into()).status(), 400);
        assert_eq!(
            ApiError::from(ValidationError::MissingBody).status(),
            400
        );
        let not_found = ApiError::RouteNotFound {
            method: "GET".into(),
            path: "/nope".into(),
        };
        assert_eq!(not_found.status(), 404);
        assert_eq!(ApiResponse::from(not_found).status, 404);
        assert_eq!(ApiError::Storage(StorageError::Poisoned).status(), 500);
    }

    #[test]
    fn test_envelope_parses_error_shape() {
        let envelope: Envelope<Value> =
            serde_json::from_value(json!({"success": false, "error": "boom"})).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.as_deref(), Some("boom"));
    }
}
