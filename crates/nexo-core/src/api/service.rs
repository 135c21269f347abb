//! API request handling
//!
//! `ApiService` owns the document database and turns `(method, path, body)`
//! into an enveloped response. Listening for HTTP connections is left to
//! whatever host embeds it.

use std::path::Path;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use super::{ApiError, ApiResponse};
use crate::models::{
    local_date, Category, Library, LibraryEntry, LibraryEntryDraft, RecordId, Review,
    ReviewDraft, Status, ANONYMOUS_AUTHOR, DEFAULT_DATE_FORMAT,
};
use crate::storage::{LibraryDocument, SqliteDocuments, StorageResult};

/// Review as posted by a client; server-side defaults fill the gaps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub id: Option<RecordId>,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub score: Option<i64>,
    pub body: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub likes: Option<u32>,
    pub section: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// Library entry as posted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySubmission {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub status: Option<Status>,
    pub date_added: Option<String>,
    pub hours_played: Option<u32>,
}

/// Handler for the REST surface
pub struct ApiService {
    db: SqliteDocuments,
    date_format: String,
}

impl ApiService {
    pub fn new(db: SqliteDocuments) -> Self {
        Self {
            db,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Open the document database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::new(SqliteDocuments::open(path)?))
    }

    /// Format used when the server has to date a record itself
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Handle one request
    ///
    /// Never fails: errors are turned into `{success: false, error}`
    /// responses with the matching status code.
    pub fn handle(&self, method: &str, path: &str, body: Option<&str>) -> ApiResponse {
        debug!("{} {}", method, path);
        match self.route(method, path, body) {
            Ok(response) => response,
            Err(e) => {
                if e.status() >= 500 {
                    error!("{} {} failed: {}", method, path, e);
                } else {
                    debug!("{} {} rejected: {}", method, path, e);
                }
                e.into()
            }
        }
    }

    fn route(&self, method: &str, path: &str, body: Option<&str>) -> Result<ApiResponse, ApiError> {
        let path_only = path.split('?').next().unwrap_or_default();
        let decoded = path_only
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map_err(|_| ApiError::BadRequest(format!("malformed path segment '{}'", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let segments: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();

        match (method.to_ascii_uppercase().as_str(), segments.as_slice()) {
            ("GET", []) => Ok(ApiResponse {
                status: 200,
                body: describe(),
            }),
            ("GET", ["reviews"]) => data(&self.list_reviews()?),
            ("POST", ["reviews"]) => {
                let submission = parse_body(body)?;
                data(&self.create_review(submission)?)
            }
            ("DELETE", ["reviews", id]) => {
                let id: RecordId = id
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid review id '{}'", id)))?;
                self.delete_review(id)?;
                Ok(ApiResponse::message("Review deleted"))
            }
            ("GET", ["library", user_id]) => data(&self.get_library(user_id)?),
            ("PUT", ["library", user_id]) => {
                let library = parse_body(body)?;
                data(&self.replace_library(user_id, library)?)
            }
            ("POST", ["library", user_id, category]) => {
                let category: Category = category
                    .parse()
                    .map_err(|_| ApiError::UnknownCategory(category.to_string()))?;
                let submission = parse_body(body)?;
                data(&self.append_entry(user_id, category, submission)?)
            }
            _ => Err(ApiError::RouteNotFound {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }

    // ==================== Reviews ====================

    /// All reviews, newest first
    pub fn list_reviews(&self) -> Result<Vec<Review>, ApiError> {
        Ok(self.db.list_reviews()?)
    }

    /// Create a review
    ///
    /// A submission carrying the id of a stored review returns the stored
    /// review unchanged, so clients can safely re-send.
    pub fn create_review(&self, submission: ReviewSubmission) -> Result<Review, ApiError> {
        if let Some(id) = submission.id {
            if let Some(existing) = self.db.get_review(id)? {
                debug!("Review {} already stored", id);
                return Ok(existing);
            }
        }

        let category = submission
            .category
            .as_deref()
            .map(|c| {
                c.parse::<Category>()
                    .map_err(|_| ApiError::UnknownCategory(c.to_string()))
            })
            .transpose()?;

        let draft = ReviewDraft {
            subject: submission.subject.unwrap_or_default(),
            category,
            score: submission.score,
            body: submission.body.unwrap_or_default(),
            section: submission.section.unwrap_or_default(),
            image_url: submission.image_url,
        };
        let author = submission
            .author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
        let date = submission
            .date
            .unwrap_or_else(|| local_date(&self.date_format));

        let mut review = draft.into_review(
            submission.id.unwrap_or_else(RecordId::generate),
            author,
            date,
        )?;
        review.likes = submission.likes.unwrap_or(0);

        self.db.insert_review(&review, Utc::now())?;
        info!("Created review {} for '{}'", review.id, review.subject);
        Ok(review)
    }

    /// Delete a review; deleting an unknown id is not an error
    pub fn delete_review(&self, id: RecordId) -> Result<(), ApiError> {
        if self.db.delete_review(id)? {
            info!("Deleted review {}", id);
        } else {
            debug!("Review {} was already absent", id);
        }
        Ok(())
    }

    // ==================== Libraries ====================

    /// Fetch a user's library, creating an empty one on first access
    pub fn get_library(&self, user_id: &str) -> Result<LibraryDocument, ApiError> {
        if let Some(doc) = self.db.get_library(user_id)? {
            return Ok(doc);
        }
        info!("Creating library for {}", user_id);
        Ok(self.db.put_library(user_id, &Library::new())?)
    }

    /// Replace a user's library wholesale
    pub fn replace_library(
        &self,
        user_id: &str,
        library: Library,
    ) -> Result<LibraryDocument, ApiError> {
        let doc = self.db.put_library(user_id, &library)?;
        debug!("Replaced library for {} ({} entries)", user_id, library.len());
        Ok(doc)
    }

    /// Append one entry to a category of a user's library
    pub fn append_entry(
        &self,
        user_id: &str,
        category: Category,
        submission: EntrySubmission,
    ) -> Result<LibraryDocument, ApiError> {
        let mut library = self.get_library(user_id)?.library;

        let id = submission
            .id
            .filter(|id| !library.contains_id(*id))
            .unwrap_or_else(RecordId::generate);
        let date_added = submission
            .date_added
            .unwrap_or_else(|| local_date(&self.date_format));
        let draft = LibraryEntryDraft {
            name: submission.name.unwrap_or_default(),
            status: submission.status.unwrap_or(Status::Pending),
            hours_played: submission.hours_played,
        };
        let entry: LibraryEntry = draft.into_entry(category, id, date_added)?;

        info!(
            "Adding '{}' to {} for {}",
            entry.name,
            category.collection_key(),
            user_id
        );
        library.entries_mut(category).push(entry);
        Ok(self.db.put_library(user_id, &library)?)
    }
}

fn data<T: Serialize>(value: &T) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::data(serde_json::to_value(value)?))
}

fn parse_body<T: DeserializeOwned>(body: Option<&str>) -> Result<T, ApiError> {
    let body = body
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing JSON body".to_string()))?;
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn describe() -> serde_json::Value {
    json!({
        "message": "Nexo API running",
        "endpoints": {
            "reviews": {
                "list": "GET /reviews",
                "create": "POST /reviews",
                "delete": "DELETE /reviews/:id"
            },
            "library": {
                "get": "GET /library/:userId",
                "replace": "PUT /library/:userId",
                "append": "POST /library/:userId/:category"
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PLACEHOLDER_IMAGE_URL;
    use serde_json::Value;

    fn service() -> ApiService {
        ApiService::new(SqliteDocuments::open_in_memory().unwrap())
    }

    fn post_review(service: &ApiService, body: Value) -> ApiResponse {
        service.handle("POST", "/reviews", Some(&body.to_string()))
    }

    fn celeste() -> Value {
        json!({
            "subject": "Celeste",
            "category": "game",
            "score": 5,
            "body": "Great"
        })
    }

    #[test]
    fn test_root_describes_endpoints() {
        let response = service().handle("GET", "/", None);
        assert_eq!(response.status, 200);
        assert!(response.body["endpoints"]["reviews"]["list"].is_string());
    }

    #[test]
    fn test_create_review_fills_defaults() {
        let service = service();
        let response = post_review(&service, celeste());

        assert_eq!(response.status, 200);
        let data = &response.body["data"];
        assert_eq!(data["subject"], "Celeste");
        assert_eq!(data["author"], ANONYMOUS_AUTHOR);
        assert_eq!(data["likes"], 0);
        assert_eq!(data["imageUrl"], PLACEHOLDER_IMAGE_URL);
        assert!(data["id"].is_i64());
        assert!(!data["date"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_create_review_keeps_supplied_image() {
        let service = service();
        let mut body = celeste();
        body["imageUrl"] = json!("https://img.example/celeste.png");
        body["likes"] = json!(3);

        let response = post_review(&service, body);
        assert_eq!(response.status, 200);
        assert_eq!(
            response.body["data"]["imageUrl"],
            "https://img.example/celeste.png"
        );

        let stored = service.list_reviews().unwrap();
        assert_eq!(stored[0].image_url, "https://img.example/celeste.png");
        assert_eq!(stored[0].likes, 3);

        let mut blank = celeste();
        blank["imageUrl"] = json!("  ");
        let response = post_review(&service, blank);
        assert_eq!(response.body["data"]["imageUrl"], PLACEHOLDER_IMAGE_URL);
    }

    #[test]
    fn test_create_review_validation() {
        let service = service();

        let mut missing_body = celeste();
        missing_body["body"] = json!("  ");
        let response = post_review(&service, missing_body);
        assert_eq!(response.status, 400);
        assert_eq!(response.body["success"], false);

        let mut bad_score = celeste();
        bad_score["score"] = json!(6);
        assert_eq!(post_review(&service, bad_score).status, 400);

        let mut bad_category = celeste();
        bad_category["category"] = json!("books");
        assert_eq!(post_review(&service, bad_category).status, 400);

        assert_eq!(service.list_reviews().unwrap().len(), 0);
    }

    #[test]
    fn test_create_review_is_idempotent_by_id() {
        let service = service();
        let mut body = celeste();
        body["id"] = json!(42);

        let first = post_review(&service, body.clone());
        body["body"] = json!("Changed my mind");
        let second = post_review(&service, body);

        assert_eq!(first.body["data"], second.body["data"]);
        assert_eq!(second.body["data"]["body"], "Great");
        assert_eq!(service.list_reviews().unwrap().len(), 1);
    }

    #[test]
    fn test_list_reviews_newest_first() {
        let service = service();
        for subject in ["Halo", "Celeste", "Hades"] {
            let mut body = celeste();
            body["subject"] = json!(subject);
            post_review(&service, body);
        }

        let response = service.handle("GET", "/reviews", None);
        let subjects: Vec<_> = response.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["subject"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(subjects, vec!["Hades", "Celeste", "Halo"]);
    }

    #[test]
    fn test_delete_review() {
        let service = service();
        let created = post_review(&service, celeste());
        let id = created.body["data"]["id"].as_i64().unwrap();

        let response = service.handle("DELETE", &format!("/reviews/{}", id), None);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["message"], "Review deleted");
        assert!(service.list_reviews().unwrap().is_empty());

        // Unknown ids succeed, malformed ids do not
        assert_eq!(service.handle("DELETE", "/reviews/123", None).status, 200);
        assert_eq!(service.handle("DELETE", "/reviews/abc", None).status, 400);
    }

    #[test]
    fn test_library_created_lazily() {
        let service = service();
        let response = service.handle("GET", "/library/agustin", None);

        assert_eq!(response.status, 200);
        let data = &response.body["data"];
        assert_eq!(data["userId"], "agustin");
        for key in ["games", "anime", "films", "series"] {
            assert!(data[key].as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn test_append_entry() {
        let service = service();
        let body = json!({"name": "Chrono Trigger", "status": "completed", "hoursPlayed": 30});

        let response = service.handle(
            "POST",
            "/library/agustin/games",
            Some(&body.to_string()),
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.body["data"]["games"][0]["name"], "Chrono Trigger");
        assert_eq!(response.body["data"]["games"][0]["hoursPlayed"], 30);

        let film = json!({"name": "Alien", "status": "pending", "hoursPlayed": 2});
        let response = service.handle(
            "POST",
            "/library/agustin/films",
            Some(&film.to_string()),
        );
        assert!(response.body["data"]["films"][0].get("hoursPlayed").is_none());

        let stored = service.get_library("agustin").unwrap();
        assert_eq!(stored.library.counts().total(), 2);
    }

    #[test]
    fn test_append_entry_rejects_unknown_category() {
        let service = service();
        let body = json!({"name": "Dune", "status": "pending"}).to_string();
        let response = service.handle("POST", "/library/agustin/books", Some(&body));

        assert_eq!(response.status, 400);
        assert!(response.body["error"].as_str().unwrap().contains("books"));
    }

    #[test]
    fn test_append_entry_requires_name() {
        let service = service();
        let body = json!({"name": " ", "status": "pending"}).to_string();
        let response = service.handle("POST", "/library/agustin/anime", Some(&body));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_replace_library() {
        let service = service();
        let mut library = Library::new();
        library.series.push(
            LibraryEntryDraft::new("Dark", Status::InProgress)
                .into_entry(Category::Series, RecordId(5), "1/1/2024".to_string())
                .unwrap(),
        );

        let body = serde_json::to_string(&library).unwrap();
        let response = service.handle("PUT", "/library/agustin", Some(&body));
        assert_eq!(response.status, 200);

        let stored = service.get_library("agustin").unwrap();
        assert_eq!(stored.library, library);
    }

    #[test]
    fn test_bad_requests() {
        let service = service();
        assert_eq!(service.handle("PUT", "/library/agustin", None).status, 400);
        assert_eq!(
            service
                .handle("POST", "/reviews", Some("{not json"))
                .status,
            400
        );
        assert_eq!(service.handle("GET", "/unknown", None).status, 404);
        assert_eq!(service.handle("PATCH", "/reviews", None).status, 404);
    }

    #[test]
    fn test_encoded_user_id_is_one_segment() {
        let service = service();
        let body = json!({"name": "Dune", "status": "pending"}).to_string();

        let response = service.handle("POST", "/library/a%2Fb/films", Some(&body));
        assert_eq!(response.status, 200);
        assert_eq!(response.body["data"]["userId"], "a/b");
        assert_eq!(service.get_library("a/b").unwrap().library.films.len(), 1);

        assert_eq!(service.handle("GET", "/library/%FF", None).status, 400);
    }

    #[test]
    fn test_query_string_ignored() {
        let response = service().handle("get", "/reviews?page=2", None);
        assert_eq!(response.status, 200);
    }
}
