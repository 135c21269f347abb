//! Direct REST API commands
//!
//! These talk to the API without going through the session cache, which
//! is handy for checking what the server actually holds.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use nexo_core::api::{ApiClient, ApiService, EntrySubmission, HttpTransport, LocalTransport};
use nexo_core::{Category, Config, RecordId, Review, Status, StoreBackend};

use crate::output::Output;

/// Build an API client from the configuration
///
/// `api_url` wins; otherwise the embedded store's database is served
/// in-process.
pub fn client(config: &Config) -> Result<ApiClient> {
    if let Some(url) = config.api_url.as_deref() {
        let transport = HttpTransport::new(url, config.store_timeout())
            .with_context(|| format!("Failed to set up HTTP client for {}", url))?;
        return Ok(ApiClient::new(transport));
    }

    if config.store == StoreBackend::Embedded {
        let path = config.sqlite_path();
        let service = ApiService::open(&path)
            .with_context(|| format!("Failed to open document database {:?}", path))?
            .with_date_format(&config.date_format);
        return Ok(ApiClient::new(LocalTransport::new(Arc::new(service))));
    }

    bail!(
        "No API configured. Set one with:\n  \
         nexo config set api_url http://localhost:3000\n\
         or use the embedded store:\n  \
         nexo config set store embedded"
    )
}

/// List reviews as the server returns them (newest first)
pub async fn reviews(client: &ApiClient, output: &Output) -> Result<()> {
    let reviews = client
        .list_reviews()
        .await
        .context("Failed to fetch reviews")?;
    let refs: Vec<&Review> = reviews.iter().collect();
    output.print_reviews(&refs);
    Ok(())
}

/// Delete a review on the server
pub async fn delete_review(client: &ApiClient, id: String, output: &Output) -> Result<()> {
    let id: RecordId = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid review id: '{}'", id))?;

    client
        .delete_review(id)
        .await
        .with_context(|| format!("Failed to delete review {}", id))?;

    output.success(&format!("Deleted review: {}", id));
    Ok(())
}

/// Append one entry to the user's library on the server
pub async fn append(
    client: &ApiClient,
    user_id: &str,
    category: Category,
    name: String,
    status: Status,
    hours: Option<u32>,
    output: &Output,
) -> Result<()> {
    let entry = EntrySubmission {
        name: Some(name),
        status: Some(status),
        hours_played: hours,
        ..Default::default()
    };

    let doc = client
        .append_entry(user_id, category, &entry)
        .await
        .with_context(|| format!("Failed to add entry to {}'s library", user_id))?;

    output.success(&format!(
        "Server library for {} now has {} {} entr{}",
        doc.user_id,
        doc.library.entries(category).len(),
        category.collection_key(),
        if doc.library.entries(category).len() == 1 { "y" } else { "ies" }
    ));
    output.print_library(&doc.library, Some(category));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_client_requires_api() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = match client(&config) {
            Ok(_) => panic!("client built without an API"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("No API configured"));
    }

    #[tokio::test]
    async fn test_embedded_client_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            store: StoreBackend::Embedded,
            ..Default::default()
        };
        let client = client(&config).unwrap();
        let output = Output::new(OutputFormat::Quiet);

        append(
            &client,
            "agustin",
            Category::Anime,
            "Frieren".to_string(),
            Status::InProgress,
            None,
            &output,
        )
        .await
        .unwrap();

        let doc = client.get_library("agustin").await.unwrap();
        assert_eq!(doc.library.anime[0].name, "Frieren");

        assert!(delete_review(&client, "abc".to_string(), &output).await.is_err());
        delete_review(&client, "42".to_string(), &output).await.unwrap();
    }
}
