//! In-memory domain cache
//!
//! The running session's source of truth for reviews and the library.
//! The record store only ever receives snapshots of it.

use crate::models::{Category, CategoryCounts, Library, LibraryEntry, RecordId, Review};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainCache {
    reviews: Vec<Review>,
    library: Library,
}

impl DomainCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn review(&self, id: RecordId) -> Option<&Review> {
        self.reviews.iter().find(|r| r.id == id)
    }

    /// Append a review, giving it a fresh id if its id is taken
    pub fn add_review(&mut self, mut review: Review) -> &Review {
        while self.review(review.id).is_some() {
            review.id = RecordId::generate();
        }
        self.reviews.push(review);
        &self.reviews[self.reviews.len() - 1]
    }

    /// Append an entry to `category`, giving it a fresh id if its id is taken
    ///
    /// Hours played only survive on games.
    pub fn add_library_entry(&mut self, category: Category, mut entry: LibraryEntry) -> &LibraryEntry {
        while self.library.contains_id(entry.id) {
            entry.id = RecordId::generate();
        }
        entry.normalize_for(category);
        let entries = self.library.entries_mut(category);
        entries.push(entry);
        &entries[entries.len() - 1]
    }

    pub fn remove_review(&mut self, id: RecordId) -> Option<Review> {
        let index = self.reviews.iter().position(|r| r.id == id)?;
        Some(self.reviews.remove(index))
    }

    /// Reviews whose subject matches `subject` (trimmed, case-insensitive)
    pub fn reviews_for(&self, subject: &str) -> Vec<&Review> {
        self.reviews
            .iter()
            .filter(|r| r.matches_subject(subject))
            .collect()
    }

    pub fn category_counts(&self) -> CategoryCounts {
        self.library.counts()
    }

    pub fn replace_reviews(&mut self, reviews: Vec<Review>) {
        self.reviews = reviews;
    }

    pub fn replace_library(&mut self, library: Library) {
        self.library = library;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LibraryEntryDraft, ReviewDraft, Status};

    fn review(id: i64, subject: &str) -> Review {
        ReviewDraft {
            subject: subject.to_string(),
            category: Some(Category::Game),
            score: Some(4),
            body: "Solid".to_string(),
            section: "games".to_string(),
            image_url: None,
        }
        .into_review(RecordId(id), "Anonymous".to_string(), "1/1/2024".to_string())
        .unwrap()
    }

    fn entry(id: i64, name: &str, category: Category) -> LibraryEntry {
        LibraryEntryDraft::new(name, Status::Pending)
            .into_entry(category, RecordId(id), "1/1/2024".to_string())
            .unwrap()
    }

    #[test]
    fn test_add_review_appends() {
        let mut cache = DomainCache::new();
        cache.add_review(review(1, "Halo"));
        cache.add_review(review(2, "Celeste"));

        let subjects: Vec<_> = cache.reviews().iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Halo", "Celeste"]);
    }

    #[test]
    fn test_colliding_ids_are_reassigned() {
        let mut cache = DomainCache::new();
        cache.add_review(review(1, "Halo"));
        let second = cache.add_review(review(1, "Celeste")).id;
        assert_ne!(second, RecordId(1));

        cache.add_library_entry(Category::Game, entry(5, "Hades", Category::Game));
        let id = cache
            .add_library_entry(Category::Film, entry(5, "Alien", Category::Film))
            .id;
        assert_ne!(id, RecordId(5));
        assert_eq!(cache.library().len(), 2);
    }

    #[test]
    fn test_entry_hours_follow_target_category() {
        let mut cache = DomainCache::new();
        let game = LibraryEntryDraft::new("Hades", Status::Completed)
            .with_hours(40)
            .into_entry(Category::Game, RecordId(1), "1/1/2024".to_string())
            .unwrap();

        let filed = cache.add_library_entry(Category::Film, game.clone());
        assert_eq!(filed.hours_played, None);

        let kept = cache.add_library_entry(Category::Game, game);
        assert_eq!(kept.hours_played, Some(40));
    }

    #[test]
    fn test_reviews_for_matching() {
        let mut cache = DomainCache::new();
        cache.add_review(review(1, "Halo"));
        cache.add_review(review(2, "HALO"));
        cache.add_review(review(3, "Celeste"));

        assert_eq!(cache.reviews_for("Halo").len(), 2);
        assert_eq!(cache.reviews_for("  halo ").len(), 2);
        assert!(cache.reviews_for("Hal").is_empty());
    }

    #[test]
    fn test_reviews_for_compares_stored_subject_as_is() {
        let mut cache = DomainCache::new();
        // Stored subjects are trimmed on submission, but loaded data may not be
        let mut untrimmed = review(1, "Halo");
        untrimmed.subject = "halo ".to_string();
        cache.replace_reviews(vec![untrimmed]);

        assert!(cache.reviews_for("Halo").is_empty());
    }

    #[test]
    fn test_remove_review() {
        let mut cache = DomainCache::new();
        cache.add_review(review(1, "Halo"));

        assert_eq!(cache.remove_review(RecordId(1)).unwrap().subject, "Halo");
        assert!(cache.remove_review(RecordId(1)).is_none());
        assert!(cache.reviews().is_empty());
    }

    #[test]
    fn test_category_counts() {
        let mut cache = DomainCache::new();
        cache.add_library_entry(Category::Game, entry(1, "Hades", Category::Game));
        cache.add_library_entry(Category::Game, entry(2, "Celeste", Category::Game));
        cache.add_library_entry(Category::Series, entry(3, "Dark", Category::Series));

        let counts = cache.category_counts();
        assert_eq!(counts.games, 2);
        assert_eq!(counts.series, 1);
        assert_eq!(counts.anime, 0);
        assert_eq!(counts.total(), 3);
    }
}
