//! Domain error types
//!
//! Validation failures are local rejections: they are reported to the
//! caller with a reason tag and never reach the record store.

use thiserror::Error;

/// Why a submitted form was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a name for the reviewed title")]
    MissingSubject,

    #[error("Please select a category")]
    MissingCategory,

    #[error("Please select a score")]
    MissingScore,

    #[error("Score {0} is outside the 1-5 range")]
    ScoreOutOfRange(i64),

    #[error("Please write your review")]
    MissingBody,

    #[error("Please enter a name")]
    MissingName,
}

impl ValidationError {
    /// Stable tag for the rejection reason
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingSubject => "missing-subject",
            ValidationError::MissingCategory => "missing-category",
            ValidationError::MissingScore => "missing-score",
            ValidationError::ScoreOutOfRange(_) => "score-out-of-range",
            ValidationError::MissingBody => "missing-body",
            ValidationError::MissingName => "missing-name",
        }
    }
}

/// Why a controller command was refused before any mutation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("No review with id {0}")]
    ReviewNotFound(i64),
}

/// Failure to parse one of the constrained value types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown category '{0}' (expected games, anime, films or series)")]
    UnknownCategory(String),

    #[error("Unknown status '{0}' (expected completed, in-progress, pending or abandoned)")]
    UnknownStatus(String),

    #[error("Score {0} is outside the 1-5 range")]
    InvalidScore(i64),
}
