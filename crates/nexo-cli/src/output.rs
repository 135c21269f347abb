//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;
use serde_json::json;

use nexo_core::models::PLACEHOLDER_IMAGE_URL;
use nexo_core::{Category, CategoryCounts, Library, LibraryEntry, PersistOutcome, Review};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single review
    pub fn print_review(&self, review: &Review) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", review.id);
                println!("Subject:  {}", review.subject);
                println!("Category: {}", review.category.label());
                println!("Score:    {} ({}/5)", review.score.stars(), review.score.get());
                println!("Author:   {}", review.author);
                println!("Date:     {}", review.date);
                if review.likes > 0 {
                    println!("Likes:    {}", review.likes);
                }
                if review.image_url != PLACEHOLDER_IMAGE_URL {
                    println!("Image:    {}", review.image_url);
                }
                println!();
                println!("{}", review.body);
            }
            OutputFormat::Json => print_json(review),
            OutputFormat::Quiet => println!("{}", review.id),
        }
    }

    /// Print a list of reviews
    pub fn print_reviews(&self, reviews: &[&Review]) {
        match self.format {
            OutputFormat::Human => {
                if reviews.is_empty() {
                    println!("No reviews found.");
                    return;
                }
                for review in reviews {
                    println!(
                        "{} | {} | {:<6} | {} | {}",
                        review.id,
                        review.score.stars(),
                        review.category.as_str(),
                        truncate(&review.subject, 30),
                        truncate_line(&review.body, 40)
                    );
                }
                println!("\n{} review(s)", reviews.len());
            }
            OutputFormat::Json => print_json(&reviews),
            OutputFormat::Quiet => {
                for review in reviews {
                    println!("{}", review.id);
                }
            }
        }
    }

    /// Print the library, or one category of it
    pub fn print_library(&self, library: &Library, only: Option<Category>) {
        match self.format {
            OutputFormat::Human => {
                let mut printed = 0;
                for (category, entries) in library.iter() {
                    if only.is_some_and(|c| c != category) {
                        continue;
                    }
                    println!("── {} ({}) ──", category.label(), entries.len());
                    for entry in entries {
                        println!("{}", entry_line(entry));
                    }
                    println!();
                    printed += entries.len();
                }
                println!("{} entr{}", printed, if printed == 1 { "y" } else { "ies" });
            }
            OutputFormat::Json => match only {
                Some(category) => print_json(&library.entries(category)),
                None => print_json(library),
            },
            OutputFormat::Quiet => {
                for (category, entries) in library.iter() {
                    if only.map_or(true, |c| c == category) {
                        for entry in entries {
                            println!("{}", entry.id);
                        }
                    }
                }
            }
        }
    }

    /// Print per-category counts
    pub fn print_counts(&self, counts: &CategoryCounts) {
        match self.format {
            OutputFormat::Human => {
                for category in Category::ALL {
                    println!("{:<8} {}", category.label(), counts.get(category));
                }
                println!("{:<8} {}", "Total", counts.total());
            }
            OutputFormat::Json => print_json(counts),
            OutputFormat::Quiet => println!("{}", counts.total()),
        }
    }

    /// Report how a save went
    ///
    /// A degraded save is a warning, not an error: the change is kept for
    /// the rest of the session.
    pub fn print_outcome(&self, outcome: PersistOutcome) {
        match (self.format, outcome) {
            (_, PersistOutcome::Persisted) => {}
            (OutputFormat::Json, PersistOutcome::Degraded(reason)) => {
                println!(
                    "{}",
                    json!({"status": "degraded", "reason": reason.as_str(), "message": reason.to_string()})
                );
            }
            (_, PersistOutcome::Degraded(reason)) => {
                eprintln!("⚠ Not saved ({}). The change only lasts for this session.", reason);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

fn entry_line(entry: &LibraryEntry) -> String {
    let hours = entry
        .hours_played
        .map(|h| format!(" | {}h", h))
        .unwrap_or_default();
    format!(
        "{} | {:<11} | {}{} | added {}",
        entry.id,
        entry.status.as_str(),
        truncate(&entry.name, 35),
        hours,
        entry.date_added
    )
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
