use tether_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("short url has been deleted: {0}")]
    Deleted(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(id) => Self::NotFound(id),
            StorageError::Deleted(id) => Self::Deleted(id),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failures_keep_their_kind() {
        assert_eq!(
            ShortenerError::from(StorageError::NotFound("a".to_string())),
            ShortenerError::NotFound("a".to_string())
        );
        assert_eq!(
            ShortenerError::from(StorageError::Deleted("a".to_string())),
            ShortenerError::Deleted("a".to_string())
        );
    }

    #[test]
    fn other_storage_failures_are_wrapped() {
        let err = ShortenerError::from(StorageError::Timeout("get".to_string()));

        assert!(matches!(err, ShortenerError::Storage(StorageError::Timeout(_))));
    }
}
