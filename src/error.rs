//! Error taxonomy for cleanup browsing.

use thiserror::Error;

pub type Result<T, E = BrowseError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BrowseError {
    /// No appender is registered for a policy criterion.
    #[error("Criteria of type {key} is not supported")]
    UnsupportedCriterion { key: String },

    /// An appender exists but could not interpret the criterion value.
    #[error("Invalid value {value:?} for criteria {key}: {reason}")]
    InvalidCriterion {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Missing required query option: {0}")]
    MissingOption(&'static str),

    #[error("Invalid page limit {0}; limit must be positive")]
    InvalidLimit(u64),

    #[error("Result window too large: start {start} + limit {limit} exceeds {max}")]
    WindowTooLarge { start: u64, limit: u64, max: u64 },

    #[error("Unrecognized sort direction {0:?}")]
    InvalidSortDirection(String),

    #[error("Unsupported sort property {0:?}")]
    UnsupportedSortProperty(String),

    #[error("Search engine error: {0}")]
    Search(#[from] tantivy::TantivyError),

    #[error("Search hit is missing its component id")]
    MissingHitId,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl BrowseError {
    /// Configuration problems: the policy cannot be translated with the
    /// registered appenders.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCriterion { .. } | Self::InvalidCriterion { .. }
        )
    }

    /// Caller supplied options that fail precondition checks.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MissingOption(_)
                | Self::InvalidLimit(_)
                | Self::WindowTooLarge { .. }
                | Self::InvalidSortDirection(_)
                | Self::UnsupportedSortProperty(_)
        )
    }
}
