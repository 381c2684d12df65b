//! Error types for the tagging write path.

use thiserror::Error;

use tagbot_search::BackendError;
use tagbot_types::Field;

/// Rejections raised while merging an edit into a document.
///
/// Either variant leaves the stored document untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("{field} limit of {limit} exceeded")]
    LimitExceeded { field: Field, limit: usize },

    #[error("Tag \"{tag}\" is longer than {max} characters")]
    TagTooLong { tag: String, max: usize },
}

/// Errors from tagging operations.
#[derive(Debug, Error)]
pub enum TagError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Owner already has the maximum number of tagged media
    #[error("Media limit of {limit} reached")]
    MediaCapReached { limit: u64 },

    #[error("Unsupported media")]
    UnsupportedMedia,

    #[error("Sticker pack lookup failed: {0}")]
    PackLookup(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl TagError {
    /// Short reason shown to the user. Infrastructure details stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            TagError::Merge(MergeError::LimitExceeded { field, limit }) => match field {
                Field::Emoji => format!("Only {} emoji are allowed per file!", limit),
                _ => format!("Only {} tags are allowed per file!", limit),
            },
            TagError::Merge(MergeError::TagTooLong { max, .. }) => {
                format!("Tags are limited to a length of {}!", max)
            }
            TagError::MediaCapReached { limit } => {
                format!("You can only tag up to {} media!", limit)
            }
            TagError::UnsupportedMedia => {
                "I don't know how to handle that media type yet!".to_string()
            }
            TagError::PackLookup(_) | TagError::Backend(_) => {
                "Something went wrong, please try again later.".to_string()
            }
        }
    }

    /// Whether the error is a capacity rejection.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            TagError::Merge(MergeError::LimitExceeded { .. }) | TagError::MediaCapReached { .. }
        )
    }
}
