use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tether_core::{DeletionRequest, Result, ShortenedUrl, StorageError, UrlRecord};

/// A stored URL as held by the in-process backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Entry {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<Timestamp>,
}

impl Entry {
    fn active(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            deleted_at: None,
        }
    }

    fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Owner-keyed URL table shared by the in-memory and file backends.
///
/// Serializes as `owner_id -> (short_id -> entry)`. The table is never
/// handed out; backends wrap it in their own lock and expose only the
/// repository operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct UrlTable {
    owners: BTreeMap<String, BTreeMap<String, Entry>>,
}

impl UrlTable {
    /// Returns the id of the active record holding `url`, if any.
    fn find_active(&self, url: &str) -> Option<&str> {
        self.owners
            .values()
            .flat_map(|ids| ids.iter())
            .find(|(_, entry)| entry.is_active() && entry.url == url)
            .map(|(id, _)| id.as_str())
    }

    /// Whether `id` is taken by any owner, tombstones included.
    fn contains_id(&self, id: &str) -> bool {
        self.owners.values().any(|ids| ids.contains_key(id))
    }

    pub(crate) fn insert(&mut self, id: &str, url: &str, owner_id: &str) -> Result<()> {
        if let Some(existing_id) = self.find_active(url) {
            return Err(StorageError::Conflict {
                existing_id: existing_id.to_owned(),
                url: url.to_owned(),
            });
        }
        if self.contains_id(id) {
            return Err(id_taken(id));
        }

        self.owners
            .entry(owner_id.to_owned())
            .or_default()
            .insert(id.to_owned(), Entry::active(url));
        Ok(())
    }

    /// Stores every item or none. Ids already taken, or repeated within the
    /// batch, reject the whole batch.
    pub(crate) fn insert_batch(&mut self, urls: &[ShortenedUrl], owner_id: &str) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut seen = BTreeSet::new();
        for item in urls {
            if self.contains_id(&item.id) || !seen.insert(item.id.as_str()) {
                return Err(id_taken(&item.id));
            }
        }

        let ids = self.owners.entry(owner_id.to_owned()).or_default();
        for item in urls {
            ids.insert(item.id.clone(), Entry::active(item.original_url.as_str()));
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: &str) -> Result<String> {
        let entry = self
            .owners
            .values()
            .find_map(|ids| ids.get(id))
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))?;

        if entry.is_active() {
            Ok(entry.url.clone())
        } else {
            Err(StorageError::Deleted(id.to_owned()))
        }
    }

    pub(crate) fn list(&self, owner_id: &str) -> Vec<UrlRecord> {
        let Some(ids) = self.owners.get(owner_id) else {
            return Vec::new();
        };

        ids.iter()
            .filter(|(_, entry)| entry.is_active())
            .map(|(id, entry)| UrlRecord::new(id.as_str(), entry.url.as_str(), owner_id))
            .collect()
    }

    /// Tombstones every active `(owner, id)` pair of the batch.
    ///
    /// Returns how many records changed.
    pub(crate) fn delete(&mut self, batch: &[DeletionRequest], now: Timestamp) -> usize {
        let mut deleted = 0;

        for (owner_id, id) in batch.iter().flat_map(DeletionRequest::pairs) {
            let entry = self
                .owners
                .get_mut(owner_id)
                .and_then(|ids| ids.get_mut(id));

            if let Some(entry) = entry.filter(|entry| entry.is_active()) {
                entry.deleted_at = Some(now);
                deleted += 1;
            }
        }

        deleted
    }

    #[cfg(test)]
    pub(crate) fn deleted_at(&self, owner_id: &str, id: &str) -> Option<Timestamp> {
        self.owners.get(owner_id)?.get(id)?.deleted_at
    }
}

fn id_taken(id: &str) -> StorageError {
    StorageError::Query(format!("short id already exists: {id}"))
}
