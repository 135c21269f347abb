//! Library command handlers

use anyhow::{bail, Result};
use serde_json::json;

use nexo_core::{Category, LibraryEntryDraft, Session, Status, SyncController};

use crate::output::{Output, OutputFormat};

/// Add an entry to the personal library
pub async fn add(
    sync: &mut SyncController,
    session: Option<&Session>,
    category: Category,
    name: String,
    status: Status,
    hours: Option<u32>,
    output: &Output,
) -> Result<()> {
    if hours.is_some() && category != Category::Game {
        tracing::debug!("Ignoring hours played for {}", category.collection_key());
    }

    let draft = LibraryEntryDraft {
        name,
        status,
        hours_played: hours,
    };

    let added = match sync.add_library_entry(category, draft, session).await {
        Ok(added) => added,
        Err(e) => bail!("{} [{}]", e, e.reason()),
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                json!({
                    "status": "success",
                    "category": added.category.collection_key(),
                    "entry": added.entry,
                    "counts": added.counts,
                    "persisted": added.outcome.is_persisted()
                })
            );
        }
        OutputFormat::Quiet => println!("{}", added.entry.id),
        OutputFormat::Human => {
            output.success(&format!(
                "Added '{}' to {} ({} now)",
                added.entry.name,
                added.category.label(),
                added.counts.get(added.category)
            ));
        }
    }
    output.print_outcome(added.outcome);

    Ok(())
}

/// Show the library, or one category of it
pub fn show(sync: &SyncController, category: Option<Category>, output: &Output) -> Result<()> {
    output.print_library(sync.cache().library(), category);
    Ok(())
}

/// Show entry counts per category
pub fn stats(sync: &SyncController, output: &Output) -> Result<()> {
    output.print_counts(&sync.cache().category_counts());
    Ok(())
}
