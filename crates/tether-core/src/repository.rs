use crate::error::Result;
use crate::record::{DeletionRequest, ShortenedUrl, UrlRecord};
use async_trait::async_trait;

/// The record store contract shared by every backend.
///
/// Implementations own their storage exclusively and are responsible for
/// serializing concurrent callers themselves.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Stores `url` under `id` for `owner_id`.
    ///
    /// Returns `Err(Conflict)` carrying the existing id when an active record
    /// already holds the same URL, for any owner. Of several concurrent adds
    /// of one URL exactly one succeeds. An `id` already taken by any owner,
    /// including a soft-deleted record, is rejected with `Err(Query)`.
    async fn add(&self, id: &str, url: &str, owner_id: &str) -> Result<()>;

    /// Stores all of `urls` for `owner_id`, or none of them.
    ///
    /// No duplicate check is performed on the original URLs. A taken or
    /// repeated id rejects the whole batch with `Err(Query)`.
    async fn add_batch(&self, urls: &[ShortenedUrl], owner_id: &str) -> Result<()>;

    /// Returns the original URL of an active record.
    ///
    /// Returns `Err(NotFound)` if the id was never stored and `Err(Deleted)`
    /// if it has been soft-deleted.
    async fn get(&self, id: &str) -> Result<String>;

    /// Lists the active records of `owner_id`. Empty when the owner has none.
    async fn list(&self, owner_id: &str) -> Result<Vec<UrlRecord>>;

    /// Soft-deletes every `(owner_id, id)` pair of the batch.
    ///
    /// Ids not owned by the requesting owner and ids already deleted are
    /// skipped silently.
    async fn delete(&self, batch: &[DeletionRequest]) -> Result<()>;

    /// Health probe.
    async fn ping(&self) -> bool;

    /// Releases backend resources.
    async fn close(&self) -> Result<()>;
}

