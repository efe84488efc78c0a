use crate::error::{Result, ShortenerError};
use std::sync::Arc;
use tether_cleaner::DeletionQueue;
use tether_core::{DeletionRequest, Repository, ShortenedUrl, StorageError};
use tether_generator::Generator;
use tracing::{debug, error};
use url::Url;

/// Outcome of [`UrlService::shorten`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new record was stored.
    Created(String),
    /// The URL was already shortened; carries the existing short URL.
    Existing(String),
}

impl Shortened {
    pub fn short_url(&self) -> &str {
        match self {
            Shortened::Created(short_url) | Shortened::Existing(short_url) => short_url,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Shortened::Created(_))
    }
}

/// One URL of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: Option<String>,
    pub url: String,
}

impl BatchItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            correlation_id: None,
            url: url.into(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A stored URL as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortLink {
    pub correlation_id: Option<String>,
    pub short_url: String,
    pub original_url: String,
}

/// URL shortening on top of a [`Repository`].
///
/// Ids come from the [`Generator`]; collisions are not retried. Deletions
/// go through the asynchronous pipeline behind [`DeletionQueue`].
pub struct UrlService<R: ?Sized, G> {
    repository: Arc<R>,
    generator: G,
    deletions: DeletionQueue,
    base_url: String,
}

impl<R: Repository + ?Sized, G: Generator> UrlService<R, G> {
    /// `base_url` is the prefix of every short URL; a trailing slash is
    /// ignored.
    pub fn new(
        repository: Arc<R>,
        generator: G,
        deletions: DeletionQueue,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            repository,
            generator,
            deletions,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shortens `url` for `owner_id`.
    ///
    /// A URL that is already stored is not stored again; its existing short
    /// URL is returned as [`Shortened::Existing`].
    pub async fn shorten(&self, url: &str, owner_id: &str) -> Result<Shortened> {
        let url = validate_url(url)?;
        let id = self.generator.generate();

        match self.repository.add(&id, url, owner_id).await {
            Ok(()) => {
                debug!(id = %id, owner_id = %owner_id, "shortened url");
                Ok(Shortened::Created(self.short_url(&id)))
            }
            Err(StorageError::Conflict { existing_id, .. }) => {
                debug!(existing_id = %existing_id, owner_id = %owner_id, "url already shortened");
                Ok(Shortened::Existing(self.short_url(&existing_id)))
            }
            Err(err) => {
                error!(
                    error = %err,
                    id = %id,
                    owner_id = %owner_id,
                    url = %url,
                    "failed to store url"
                );
                Err(err.into())
            }
        }
    }

    /// Shortens every item for `owner_id`, or none of them.
    ///
    /// Items are validated before anything is stored. Results are returned
    /// in request order.
    pub async fn shorten_batch(
        &self,
        items: Vec<BatchItem>,
        owner_id: &str,
    ) -> Result<Vec<ShortLink>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut urls = Vec::with_capacity(items.len());
        for item in items {
            let original_url = validate_url(&item.url)?;
            urls.push(ShortenedUrl {
                correlation_id: item.correlation_id,
                id: self.generator.generate(),
                original_url: original_url.to_string(),
            });
        }

        if let Err(err) = self.repository.add_batch(&urls, owner_id).await {
            error!(
                error = %err,
                owner_id = %owner_id,
                urls = urls.len(),
                "failed to store url batch"
            );
            return Err(err.into());
        }
        debug!(owner_id = %owner_id, urls = urls.len(), "shortened url batch");

        Ok(urls
            .into_iter()
            .map(|url| ShortLink {
                short_url: self.short_url(&url.id),
                correlation_id: url.correlation_id,
                original_url: url.original_url,
            })
            .collect())
    }

    /// Returns the original URL behind `id`.
    pub async fn expand(&self, id: &str) -> Result<String> {
        self.repository.get(id).await.map_err(|err| {
            if !err.is_expected() {
                error!(error = %err, id = %id, "failed to get url");
            }
            ShortenerError::from(err)
        })
    }

    /// Lists the active URLs of `owner_id`.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<ShortLink>> {
        let records = self.repository.list(owner_id).await.map_err(|err| {
            error!(error = %err, owner_id = %owner_id, "failed to list urls");
            ShortenerError::from(err)
        })?;

        Ok(records
            .into_iter()
            .map(|record| ShortLink {
                correlation_id: None,
                short_url: self.short_url(&record.id),
                original_url: record.original_url,
            })
            .collect())
    }

    /// Queues `ids` of `owner_id` for deletion and returns immediately.
    ///
    /// Ids the owner does not own are skipped by the store.
    pub fn delete(&self, owner_id: &str, ids: Vec<String>) {
        self.deletions.queue(DeletionRequest::new(owner_id, ids));
    }

    /// Reports whether the store is reachable.
    pub async fn ping(&self) -> bool {
        let healthy = self.repository.ping().await;
        if !healthy {
            error!("url store is unreachable");
        }
        healthy
    }

    fn short_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }
}

/// Accepts absolute `http`/`https` URLs with a host.
fn validate_url(raw: &str) -> Result<&str> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ShortenerError::InvalidUrl("url cannot be empty".to_string()));
    }

    let parsed =
        Url::parse(url).map_err(|err| ShortenerError::InvalidUrl(format!("{url}: {err}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ShortenerError::InvalidUrl(format!(
            "url scheme must be http or https: {url}"
        )));
    }
    if parsed.host().is_none() {
        return Err(ShortenerError::InvalidUrl(format!("url has no host: {url}")));
    }

    Ok(url)
}
