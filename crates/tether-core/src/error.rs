use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The short id was never stored.
    #[error("short id not found: {0}")]
    NotFound(String),
    /// The short id existed but has been soft-deleted.
    #[error("short id has been deleted: {0}")]
    Deleted(String),
    /// The original URL is already stored under `existing_id`.
    #[error("url already shortened as '{existing_id}': {url}")]
    Conflict { existing_id: String, url: String },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Returns `true` for outcomes that describe the data rather than a
    /// failing backend (`NotFound`, `Deleted`, `Conflict`).
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound(_) | StorageError::Deleted(_) | StorageError::Conflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_existing_id() {
        let err = StorageError::Conflict {
            existing_id: "qwerty".to_string(),
            url: "https://avito.ru".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "url already shortened as 'qwerty': https://avito.ru"
        );
    }

    #[test]
    fn expected_outcomes() {
        assert!(StorageError::NotFound("a".into()).is_expected());
        assert!(StorageError::Deleted("a".into()).is_expected());
        assert!(!StorageError::Io("disk full".into()).is_expected());
        assert!(!StorageError::Timeout("3s".into()).is_expected());
    }
}
