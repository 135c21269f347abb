//! Data models for Nexo
//!
//! Defines the two record types (reviews and library entries), the library
//! aggregate that groups entries by category, and the form drafts the
//! presentation layer hands to the sync controller.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ValidationError};

/// Author recorded on reviews submitted without a session
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Image shown for reviews submitted without one
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://via.placeholder.com/400x250/0f3460/e94560?text=No+Image";

/// Default date format (day/month/year, no zero padding)
pub const DEFAULT_DATE_FORMAT: &str = "%-d/%-m/%Y";

/// Time-derived record identifier (milliseconds since the Unix epoch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Generate a fresh identifier
    ///
    /// Identifiers are strictly increasing within a process, so two records
    /// created in the same millisecond still get distinct ids.
    pub fn generate() -> Self {
        static LAST: AtomicI64 = AtomicI64::new(0);

        let now = Utc::now().timestamp_millis();
        let mut prev = LAST.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return RecordId(next),
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RecordId)
    }
}

/// Media category
///
/// Reviews serialize the singular form (`game`), the library uses the
/// plural collection keys (`games`). Parsing accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "games")]
    Game,
    Anime,
    #[serde(alias = "films")]
    Film,
    Series,
}

impl Category {
    /// All categories, in display order
    pub const ALL: [Category; 4] = [
        Category::Game,
        Category::Anime,
        Category::Film,
        Category::Series,
    ];

    /// Singular name, as stored on reviews
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Game => "game",
            Category::Anime => "anime",
            Category::Film => "film",
            Category::Series => "series",
        }
    }

    /// Key of the matching sequence in the library aggregate
    pub fn collection_key(&self) -> &'static str {
        match self {
            Category::Game => "games",
            Category::Anime => "anime",
            Category::Film => "films",
            Category::Series => "series",
        }
    }

    /// Human-readable collection heading
    pub fn label(&self) -> &'static str {
        match self {
            Category::Game => "Games",
            Category::Anime => "Anime",
            Category::Film => "Films",
            Category::Series => "Series",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "game" | "games" => Ok(Category::Game),
            "anime" => Ok(Category::Anime),
            "film" | "films" => Ok(Category::Film),
            "series" => Ok(Category::Series),
            _ => Err(ParseError::UnknownCategory(s.to_string())),
        }
    }
}

/// Progress of a library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Completed,
    InProgress,
    Pending,
    Abandoned,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Completed => "completed",
            Status::InProgress => "in-progress",
            Status::Pending => "pending",
            Status::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Status::Completed),
            "in-progress" | "in_progress" | "inprogress" => Ok(Status::InProgress),
            "pending" => Ok(Status::Pending),
            "abandoned" => Ok(Status::Abandoned),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

/// Review score, always within `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, ParseError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Score(value as u8))
        } else {
            Err(ParseError::InvalidScore(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Render as filled and empty stars, e.g. `★★★☆☆`
    pub fn stars(self) -> String {
        let filled = usize::from(self.0);
        let empty = usize::from(Self::MAX) - filled;
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

impl TryFrom<i64> for Score {
    type Error = ParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

/// A published review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: RecordId,
    /// Name of the reviewed title
    pub subject: String,
    pub category: Category,
    pub score: Score,
    pub body: String,
    /// Creation date, already formatted for display
    pub date: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub likes: u32,
    /// Cover image; a placeholder when none was supplied
    #[serde(rename = "imageUrl", default = "default_image_url")]
    pub image_url: String,
    /// Site section the review was submitted from
    #[serde(default)]
    pub section: String,
}

fn default_author() -> String {
    ANONYMOUS_AUTHOR.to_string()
}

fn default_image_url() -> String {
    PLACEHOLDER_IMAGE_URL.to_string()
}

impl Review {
    /// Case-insensitive subject match
    ///
    /// The query is trimmed; the stored subject is compared as stored, so a
    /// subject saved with stray whitespace only matches a query carrying
    /// the same whitespace after trimming (i.e. never).
    pub fn matches_subject(&self, query: &str) -> bool {
        self.subject.to_lowercase() == query.trim().to_lowercase()
    }
}

/// An item in the personal library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub id: RecordId,
    pub name: String,
    pub status: Status,
    pub date_added: String,
    /// Only ever set for games
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_played: Option<u32>,
}

impl LibraryEntry {
    /// Drop hours played unless the entry sits in games with a positive value
    pub fn normalize_for(&mut self, category: Category) {
        self.hours_played = hours_for(category, self.hours_played);
    }
}

fn hours_for(category: Category, hours: Option<u32>) -> Option<u32> {
    match category {
        Category::Game => hours.filter(|h| *h > 0),
        _ => None,
    }
}

/// The personal library: four ordered category sequences
///
/// Deserializing normalizes hours played, so a loaded library never carries
/// hours outside games.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "StoredLibrary")]
pub struct Library {
    pub games: Vec<LibraryEntry>,
    pub anime: Vec<LibraryEntry>,
    pub films: Vec<LibraryEntry>,
    pub series: Vec<LibraryEntry>,
}

#[derive(Deserialize)]
struct StoredLibrary {
    #[serde(default)]
    games: Vec<LibraryEntry>,
    #[serde(default)]
    anime: Vec<LibraryEntry>,
    #[serde(default)]
    films: Vec<LibraryEntry>,
    #[serde(default)]
    series: Vec<LibraryEntry>,
}

impl From<StoredLibrary> for Library {
    fn from(stored: StoredLibrary) -> Self {
        let mut library = Library {
            games: stored.games,
            anime: stored.anime,
            films: stored.films,
            series: stored.series,
        };
        for category in Category::ALL {
            for entry in library.entries_mut(category) {
                entry.normalize_for(category);
            }
        }
        library
    }
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one category, in insertion order
    pub fn entries(&self, category: Category) -> &[LibraryEntry] {
        match category {
            Category::Game => &self.games,
            Category::Anime => &self.anime,
            Category::Film => &self.films,
            Category::Series => &self.series,
        }
    }

    pub fn entries_mut(&mut self, category: Category) -> &mut Vec<LibraryEntry> {
        match category {
            Category::Game => &mut self.games,
            Category::Anime => &mut self.anime,
            Category::Film => &mut self.films,
            Category::Series => &mut self.series,
        }
    }

    /// Iterate over `(category, entries)` in display order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[LibraryEntry])> {
        Category::ALL.into_iter().map(move |c| (c, self.entries(c)))
    }

    pub fn counts(&self) -> CategoryCounts {
        CategoryCounts {
            games: self.games.len(),
            anime: self.anime.len(),
            films: self.films.len(),
            series: self.series.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_id(&self, id: RecordId) -> bool {
        self.iter()
            .any(|(_, entries)| entries.iter().any(|e| e.id == id))
    }
}

/// Sizes of the four library sequences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub games: usize,
    pub anime: usize,
    pub films: usize,
    pub series: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Game => self.games,
            Category::Anime => self.anime,
            Category::Film => self.films,
            Category::Series => self.series,
        }
    }

    pub fn total(&self) -> usize {
        self.games + self.anime + self.films + self.series
    }
}

/// The active user, passed explicitly into every mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
}

impl Session {
    /// Login stub: no credentials are checked
    pub fn login(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into().trim().to_string();
        let user_id = display_name.to_lowercase().replace(char::is_whitespace, "-");
        Self {
            user_id,
            display_name,
        }
    }

    /// Author name for a review submitted under an optional session
    pub fn author_name(session: Option<&Session>) -> String {
        session
            .map(|s| s.display_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_author)
    }
}

/// Review form contents, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDraft {
    pub subject: String,
    pub category: Option<Category>,
    pub score: Option<i64>,
    pub body: String,
    pub section: String,
    pub image_url: Option<String>,
}

impl ReviewDraft {
    /// Validate the draft and build a review
    ///
    /// Checks run in form order: subject, category, score, body.
    pub fn into_review(
        self,
        id: RecordId,
        author: String,
        date: String,
    ) -> Result<Review, ValidationError> {
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(ValidationError::MissingSubject);
        }
        let category = self.category.ok_or(ValidationError::MissingCategory)?;
        let raw_score = self.score.ok_or(ValidationError::MissingScore)?;
        let score =
            Score::new(raw_score).map_err(|_| ValidationError::ScoreOutOfRange(raw_score))?;
        let body = self.body.trim();
        if body.is_empty() {
            return Err(ValidationError::MissingBody);
        }

        Ok(Review {
            id,
            subject: subject.to_string(),
            category,
            score,
            body: body.to_string(),
            date,
            author,
            likes: 0,
            image_url: self
                .image_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(default_image_url),
            section: self.section.trim().to_string(),
        })
    }
}

/// Library "add" form contents, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntryDraft {
    pub name: String,
    pub status: Status,
    pub hours_played: Option<u32>,
}

impl LibraryEntryDraft {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status,
            hours_played: None,
        }
    }

    pub fn with_hours(mut self, hours: u32) -> Self {
        self.hours_played = Some(hours);
        self
    }

    /// Validate the draft and build an entry for `category`
    ///
    /// Hours played are kept only for games and only when positive.
    pub fn into_entry(
        self,
        category: Category,
        id: RecordId,
        date_added: String,
    ) -> Result<LibraryEntry, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }

        let hours_played = hours_for(category, self.hours_played);

        Ok(LibraryEntry {
            id,
            name: name.to_string(),
            status: self.status,
            date_added,
            hours_played,
        })
    }
}

/// Today's date in the local timezone, formatted with a chrono format string
pub fn local_date(format: &str) -> String {
    Local::now().format(format).to_string()
}
