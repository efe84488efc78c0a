use crate::table::UrlTable;
use async_trait::async_trait;
use jiff::Timestamp;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tether_core::{DeletionRequest, Repository, Result, ShortenedUrl, StorageError, UrlRecord};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Snapshot-file implementation of the [`Repository`] trait.
///
/// Reads are served from an in-memory mirror. Every mutation is applied to a
/// copy of the table, the copy is written to a sibling temp file which then
/// atomically replaces the snapshot, and only afterwards is the copy swapped
/// in. A failed write therefore leaves both memory and disk untouched. The
/// write lock is held for the whole sequence so snapshot rewrites never
/// interleave.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    table: RwLock<UrlTable>,
}

impl FileRepository {
    /// Opens the store backed by the snapshot at `path`.
    ///
    /// A missing or empty file yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = load(&path).await?;
        info!(path = %path.display(), "opened url snapshot");

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    /// Returns the snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn persist(&self, table: &UrlTable) -> Result<()> {
        let bytes = serde_json::to_vec(table)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let temp_path = self.temp_path();

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| io_error(&temp_path, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| io_error(&temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error(&temp_path, e))?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "rewrote url snapshot");
        Ok(())
    }
}

async fn load(path: &Path) -> Result<UrlTable> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "url snapshot not found, starting empty");
            return Ok(UrlTable::default());
        }
        Err(e) => return Err(io_error(path, e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(UrlTable::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::InvalidData(format!(
            "cannot parse url snapshot '{}': {e}",
            path.display()
        ))
    })
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io(format!("{}: {err}", path.display()))
}

#[async_trait]
impl Repository for FileRepository {
    async fn add(&self, id: &str, url: &str, owner_id: &str) -> Result<()> {
        let mut table = self.table.write().await;

        let mut next = table.clone();
        next.insert(id, url, owner_id)?;
        self.persist(&next).await?;
        *table = next;

        debug!(id, owner_id, "stored url");
        Ok(())
    }

    async fn add_batch(&self, urls: &[ShortenedUrl], owner_id: &str) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut table = self.table.write().await;

        let mut next = table.clone();
        next.insert_batch(urls, owner_id)?;
        self.persist(&next).await?;
        *table = next;

        debug!(owner_id, count = urls.len(), "stored url batch");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<String> {
        self.table.read().await.get(id)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.table.read().await.list(owner_id))
    }

    async fn delete(&self, batch: &[DeletionRequest]) -> Result<()> {
        let mut table = self.table.write().await;

        let mut next = table.clone();
        let deleted = next.delete(batch, Timestamp::now());
        if deleted == 0 {
            debug!(requests = batch.len(), "deletion batch matched no active record");
            return Ok(());
        }

        if let Err(err) = self.persist(&next).await {
            warn!(error = %err, requests = batch.len(), "failed to persist deletion batch");
            return Err(err);
        }
        *table = next;

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
