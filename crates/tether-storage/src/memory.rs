use crate::table::UrlTable;
use async_trait::async_trait;
use jiff::Timestamp;
use parking_lot::RwLock;
use tether_core::{DeletionRequest, Repository, Result, ShortenedUrl, UrlRecord};
use tracing::debug;

/// Process-lifetime implementation of the [`Repository`] trait.
///
/// A single reader/writer lock guards the whole table, which makes the
/// duplicate check and the insert of [`Repository::add`] one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    table: RwLock<UrlTable>,
}

impl InMemoryRepository {
    /// Creates an empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add(&self, id: &str, url: &str, owner_id: &str) -> Result<()> {
        self.table.write().insert(id, url, owner_id)?;
        debug!(id, owner_id, "stored url");
        Ok(())
    }

    async fn add_batch(&self, urls: &[ShortenedUrl], owner_id: &str) -> Result<()> {
        self.table.write().insert_batch(urls, owner_id)?;
        debug!(owner_id, count = urls.len(), "stored url batch");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<String> {
        self.table.read().get(id)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.table.read().list(owner_id))
    }

    async fn delete(&self, batch: &[DeletionRequest]) -> Result<()> {
        let deleted = self.table.write().delete(batch, Timestamp::now());
        debug!(requests = batch.len(), deleted, "applied deletion batch");
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tether_core::StorageError;

    #[tokio::test]
    async fn add_and_get() {
        let repo = InMemoryRepository::new();

        repo.add("qwerty", "https://avito.ru", "u1").await.unwrap();

        assert_eq!(repo.get("qwerty").await.unwrap(), "https://avito.ru");
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let err = repo.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn add_conflict_reports_existing_id() {
        let repo = InMemoryRepository::new();
        repo.add("id1", "https://example.com", "u1").await.unwrap();

        let err = repo
            .add("id2", "https://example.com", "u2")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Conflict { existing_id, .. } if existing_id == "id1"
        ));
    }

    #[tokio::test]
    async fn batch_delete_scenario() {
        let repo = InMemoryRepository::new();
        repo.add("a", "https://a.example", "u1").await.unwrap();
        repo.add("b", "https://b.example", "u1").await.unwrap();

        repo.delete(&[DeletionRequest::new("u1", ["a"])])
            .await
            .unwrap();

        assert!(matches!(
            repo.get("a").await.unwrap_err(),
            StorageError::Deleted(_)
        ));
        assert_eq!(repo.get("b").await.unwrap(), "https://b.example");
        let listed = repo.list("u1").await.unwrap();
        assert_eq!(listed, vec![UrlRecord::new("b", "https://b.example", "u1")]);
    }

    #[tokio::test]
    async fn list_is_owner_scoped() {
        let repo = InMemoryRepository::new();
        repo.add("a", "https://a.example", "u1").await.unwrap();
        repo.add("b", "https://b.example", "u2").await.unwrap();

        let listed = repo.list("u1").await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "a");
        assert!(repo.list("u3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_other_owner_is_ignored() {
        let repo = InMemoryRepository::new();
        repo.add("a", "https://a.example", "u1").await.unwrap();

        repo.delete(&[DeletionRequest::new("u2", ["a"])])
            .await
            .unwrap();

        assert_eq!(repo.get("a").await.unwrap(), "https://a.example");
    }

    #[tokio::test]
    async fn add_batch_then_list() {
        let repo = InMemoryRepository::new();

        repo.add_batch(
            &[
                ShortenedUrl::new("a", "https://a.example").with_correlation_id("1"),
                ShortenedUrl::new("b", "https://b.example").with_correlation_id("2"),
            ],
            "u1",
        )
        .await
        .unwrap();

        let ids: Vec<_> = repo
            .list("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn reused_ids_never_overwrite_records() {
        let repo = InMemoryRepository::new();
        repo.add("a", "https://one.example", "u1").await.unwrap();
        repo.delete(&[DeletionRequest::new("u1", ["a"])])
            .await
            .unwrap();

        let readd = repo.add("a", "https://two.example", "u1").await;
        let batch = repo
            .add_batch(&[ShortenedUrl::new("a", "https://three.example")], "u1")
            .await;
        let other_owner = repo.add("a", "https://four.example", "u2").await;

        assert!(matches!(readd, Err(StorageError::Query(_))));
        assert!(matches!(batch, Err(StorageError::Query(_))));
        assert!(matches!(other_owner, Err(StorageError::Query(_))));
        assert!(matches!(
            repo.get("a").await.unwrap_err(),
            StorageError::Deleted(_)
        ));
        assert!(repo.list("u1").await.unwrap().is_empty());
        assert!(repo.list("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_batch_does_not_replace_live_record() {
        let repo = InMemoryRepository::new();
        repo.add("a", "https://one.example", "u1").await.unwrap();

        let err = repo
            .add_batch(
                &[
                    ShortenedUrl::new("b", "https://two.example"),
                    ShortenedUrl::new("a", "https://three.example"),
                ],
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Query(_)));
        assert_eq!(repo.get("a").await.unwrap(), "https://one.example");
        assert!(matches!(
            repo.get("b").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn ping_is_always_reachable() {
        assert!(InMemoryRepository::new().ping().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_have_one_winner() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let id = format!("id{i:02}");
                repo.add(&id, "https://example.com", "u1")
                    .await
                    .map(|_| id)
            }));
        }

        let mut winners = vec![];
        let mut existing = HashSet::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(id) => winners.push(id),
                Err(StorageError::Conflict { existing_id, .. }) => {
                    existing.insert(existing_id);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert!(existing.len() <= 1);
        if let Some(existing_id) = existing.into_iter().next() {
            assert_eq!(existing_id, winners[0]);
        }
    }
}
