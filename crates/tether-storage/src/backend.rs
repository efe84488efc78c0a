use crate::file::FileRepository;
use crate::memory::InMemoryRepository;
use crate::postgres::{PostgresRepository, PostgresSettings};
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use tether_core::{DeletionRequest, Repository, Result, ShortenedUrl, UrlRecord};
use tracing::info;

/// The storage backend selected at startup.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    File(PathBuf),
    Postgres(PostgresSettings),
}

impl StorageBackend {
    /// Picks a backend from the configured locations.
    ///
    /// A database DSN wins over a file path; with neither the store is
    /// in-memory. Empty values count as unset.
    pub fn select(file_path: Option<PathBuf>, database_dsn: Option<String>) -> Self {
        if let Some(dsn) = database_dsn.filter(|dsn| !dsn.trim().is_empty()) {
            return StorageBackend::Postgres(PostgresSettings::builder().dsn(dsn).build());
        }

        match file_path.filter(|path| !path.as_os_str().is_empty()) {
            Some(path) => StorageBackend::File(path),
            None => StorageBackend::InMemory,
        }
    }

    /// Opens the repository for this backend.
    pub async fn open(self) -> Result<AnyRepository> {
        info!(backend = %self, "opening url store");

        let repository = match self {
            StorageBackend::InMemory => AnyRepository::InMemory(InMemoryRepository::new()),
            StorageBackend::File(path) => AnyRepository::File(FileRepository::open(path).await?),
            StorageBackend::Postgres(settings) => {
                AnyRepository::Postgres(PostgresRepository::connect(settings).await?)
            }
        };

        Ok(repository)
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::InMemory => write!(f, "in-memory"),
            StorageBackend::File(path) => write!(f, "file ({})", path.display()),
            // The DSN may carry credentials.
            StorageBackend::Postgres(_) => write!(f, "postgres"),
        }
    }
}

/// A repository of whichever backend was selected at startup.
#[derive(Debug)]
pub enum AnyRepository {
    InMemory(InMemoryRepository),
    File(FileRepository),
    Postgres(PostgresRepository),
}

macro_rules! delegate {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            AnyRepository::InMemory($repo) => $call,
            AnyRepository::File($repo) => $call,
            AnyRepository::Postgres($repo) => $call,
        }
    };
}

#[async_trait]
impl Repository for AnyRepository {
    async fn add(&self, id: &str, url: &str, owner_id: &str) -> Result<()> {
        delegate!(self, repo => repo.add(id, url, owner_id).await)
    }

    async fn add_batch(&self, urls: &[ShortenedUrl], owner_id: &str) -> Result<()> {
        delegate!(self, repo => repo.add_batch(urls, owner_id).await)
    }

    async fn get(&self, id: &str) -> Result<String> {
        delegate!(self, repo => repo.get(id).await)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        delegate!(self, repo => repo.list(owner_id).await)
    }

    async fn delete(&self, batch: &[DeletionRequest]) -> Result<()> {
        delegate!(self, repo => repo.delete(batch).await)
    }

    async fn ping(&self) -> bool {
        delegate!(self, repo => repo.ping().await)
    }

    async fn close(&self) -> Result<()> {
        delegate!(self, repo => repo.close().await)
    }
}
