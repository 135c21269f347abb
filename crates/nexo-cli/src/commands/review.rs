//! Review command handlers

use anyhow::{bail, Result};

use nexo_core::{Category, CommandError, RecordId, Review, ReviewDraft, Session, SyncController};

use crate::output::Output;

/// Review fields as given on the command line
pub struct ReviewForm {
    pub subject: String,
    pub category: Option<Category>,
    pub score: Option<i64>,
    pub body: String,
    pub section: Option<String>,
    pub image: Option<String>,
}

impl ReviewForm {
    /// Section defaults to the category's collection key
    fn into_draft(self) -> ReviewDraft {
        let category = self.category;
        ReviewDraft {
            section: self.section.unwrap_or_else(|| {
                category
                    .map(|c| c.collection_key().to_string())
                    .unwrap_or_default()
            }),
            subject: self.subject,
            category,
            score: self.score,
            body: self.body,
            image_url: self.image,
        }
    }
}

/// Submit a new review
pub async fn add(
    sync: &mut SyncController,
    session: Option<&Session>,
    form: ReviewForm,
    output: &Output,
) -> Result<()> {
    let draft = form.into_draft();

    let submitted = match sync.submit_review(draft, session).await {
        Ok(submitted) => submitted,
        Err(e) => bail!("{} [{}]", e, e.reason()),
    };

    output.success(&format!(
        "Review for '{}' added by {}",
        submitted.review.subject, submitted.review.author
    ));
    output.print_outcome(submitted.outcome);
    if !output.is_json() {
        output.print_review(&submitted.review);
    }

    Ok(())
}

/// List reviews, newest first, optionally only those for one subject
pub fn list(sync: &SyncController, subject: Option<String>, output: &Output) -> Result<()> {
    let mut reviews: Vec<&Review> = match subject {
        Some(ref s) => sync.cache().reviews_for(s),
        None => sync.cache().reviews().iter().collect(),
    };
    reviews.reverse();

    output.print_reviews(&reviews);
    Ok(())
}

/// Delete a review
pub async fn delete(sync: &mut SyncController, id: String, output: &Output) -> Result<()> {
    let id = resolve_review_id(&id, sync.cache().reviews())?;

    match sync.delete_review(id).await {
        Ok(outcome) => {
            output.success(&format!("Deleted review: {}", id));
            output.print_outcome(outcome);
            Ok(())
        }
        Err(CommandError::ReviewNotFound(id)) => bail!("No review found with id {}", id),
    }
}

/// Resolve a review id, accepting the trailing digits of an id
fn resolve_review_id(id: &str, reviews: &[Review]) -> Result<RecordId> {
    let id = id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid review id: '{}'", id);
    }

    if let Ok(exact) = id.parse::<RecordId>() {
        if reviews.iter().any(|r| r.id == exact) {
            return Ok(exact);
        }
    }

    let matches: Vec<_> = reviews
        .iter()
        .filter(|r| r.id.to_string().ends_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No review found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple reviews match '{}':", id);
            for review in &matches {
                eprintln!("  {} - {}", review.id, review.subject);
            }
            bail!("Ambiguous ID. Please provide more digits.");
        }
    }
}
