use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored short URL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Caller-assigned short id.
    pub id: String,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The principal the record was created under.
    pub owner_id: String,
    /// When the record was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

impl UrlRecord {
    /// Creates an active record.
    pub fn new(
        id: impl Into<String>,
        original_url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            original_url: original_url.into(),
            owner_id: owner_id.into(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One element of a batch insert.
///
/// `correlation_id` is opaque to the store and only travels back to the
/// caller so batch responses can be matched with requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenedUrl {
    pub correlation_id: Option<String>,
    pub id: String,
    pub original_url: String,
}

impl ShortenedUrl {
    pub fn new(id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: None,
            id: id.into(),
            original_url: original_url.into(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A request to soft-delete some of an owner's short ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub owner_id: String,
    pub ids: Vec<String>,
}

impl DeletionRequest {
    pub fn new<I, S>(owner_id: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner_id: owner_id.into(),
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates over the `(owner_id, id)` pairs of the request.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ids
            .iter()
            .map(move |id| (self.owner_id.as_str(), id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_active() {
        let record = UrlRecord::new("qwerty", "https://avito.ru", "u1");
        assert!(!record.is_deleted());
    }

    #[test]
    fn deletion_request_pairs_keep_order() {
        let request = DeletionRequest::new("u1", ["b", "a", "c"]);
        let pairs: Vec<_> = request.pairs().collect();
        assert_eq!(pairs, vec![("u1", "b"), ("u1", "a"), ("u1", "c")]);
    }

    #[test]
    fn empty_deletion_request() {
        assert!(DeletionRequest::new("u1", Vec::<String>::new()).is_empty());
    }
}
