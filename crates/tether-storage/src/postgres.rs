use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Row};
use std::future::Future;
use std::time::Duration;
use tether_core::{DeletionRequest, Repository, Result, ShortenedUrl, StorageError, UrlRecord};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

const INSERT_URL: &str = r#"
    INSERT INTO urls (id, url, owner_id)
    VALUES ($1, $2, $3)
"#;

/// Connection settings for [`PostgresRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresSettings {
    #[builder(setter(into))]
    dsn: String,
    #[builder(default = 20)]
    max_connections: u32,
    #[builder(default = Duration::from_secs(30))]
    idle_timeout: Duration,
    #[builder(default = Duration::from_secs(120))]
    max_lifetime: Duration,
    /// Upper bound for every repository call, including pool acquisition.
    #[builder(default = Duration::from_secs(3))]
    call_timeout: Duration,
}

/// PostgreSQL implementation of the repository contract.
///
/// Soft delete is implemented with `deleted_at`. The `url` column is unique
/// among active rows; a violation on insert is turned into
/// [`StorageError::Conflict`] by looking up the active row's id. Batch
/// inserts and batch deletes each run in a single transaction.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PostgresRepository {
    /// Creates a repository from an existing pool. The schema must exist.
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }

    /// Opens a pool and creates the schema when missing.
    pub async fn connect(settings: PostgresSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(settings.idle_timeout)
            .max_lifetime(settings.max_lifetime)
            .acquire_timeout(settings.call_timeout)
            .connect(&settings.dsn)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool, settings.call_timeout);
        repository.migrate().await?;

        info!(
            max_connections = settings.max_connections,
            "connected to postgres url store"
        );
        Ok(repository)
    }

    /// Applies the `urls` schema. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        self.bounded(async {
            sqlx::raw_sql(SCHEMA)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, op)
            .await
            .map_err(|_| {
                StorageError::Timeout(format!(
                    "database call exceeded {} ms",
                    self.call_timeout.as_millis()
                ))
            })?
    }

    async fn active_id_for(&self, url: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT id
            FROM urls
            WHERE url = $1
              AND deleted_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn add(&self, id: &str, url: &str, owner_id: &str) -> Result<()> {
        self.bounded(async {
            let result = sqlx::query(INSERT_URL)
                .bind(id)
                .bind(url)
                .bind(owner_id)
                .execute(&self.pool)
                .await;

            match result {
                Ok(_) => {
                    debug!(id, owner_id, "stored url");
                    Ok(())
                }
                Err(err) if is_unique_violation(&err) => {
                    match self.active_id_for(url).await? {
                        Some(existing_id) => Err(StorageError::Conflict {
                            existing_id,
                            url: url.to_owned(),
                        }),
                        // The violated key was the primary key, not the url.
                        None => Err(StorageError::Query(format!(
                            "short id already exists: {id}"
                        ))),
                    }
                }
                Err(err) => Err(map_sqlx_error(err)),
            }
        })
        .await
    }

    async fn add_batch(&self, urls: &[ShortenedUrl], owner_id: &str) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        self.bounded(async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            // Statements are prepared once per connection and reused per row.
            for item in urls {
                sqlx::query(INSERT_URL)
                    .bind(&item.id)
                    .bind(&item.original_url)
                    .bind(owner_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }

            tx.commit().await.map_err(map_sqlx_error)?;
            debug!(owner_id, count = urls.len(), "stored url batch");
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<String> {
        self.bounded(async {
            let row = sqlx::query(
                r#"
                SELECT url, deleted_at IS NOT NULL AS deleted
                FROM urls
                WHERE id = $1
                LIMIT 1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            let Some(row) = row else {
                return Err(StorageError::NotFound(id.to_owned()));
            };

            let deleted: bool = row.try_get("deleted").map_err(map_sqlx_error)?;
            if deleted {
                return Err(StorageError::Deleted(id.to_owned()));
            }

            row.try_get("url").map_err(map_sqlx_error)
        })
        .await
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        self.bounded(async {
            let rows = sqlx::query(
                r#"
                SELECT id, url
                FROM urls
                WHERE owner_id = $1
                  AND deleted_at IS NULL
                ORDER BY created_at, id
                "#,
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            rows.into_iter()
                .map(|row| -> Result<UrlRecord> {
                    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
                    let url: String = row.try_get("url").map_err(map_sqlx_error)?;
                    Ok(UrlRecord::new(id, url, owner_id))
                })
                .collect()
        })
        .await
    }

    async fn delete(&self, batch: &[DeletionRequest]) -> Result<()> {
        if batch.iter().all(DeletionRequest::is_empty) {
            return Ok(());
        }

        self.bounded(async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            let mut deleted = 0;

            // now() is the transaction start, so the whole batch shares one timestamp.
            for (owner_id, id) in batch.iter().flat_map(DeletionRequest::pairs) {
                let result = sqlx::query(
                    r#"
                    UPDATE urls
                    SET deleted_at = now()
                    WHERE id = $1
                      AND owner_id = $2
                      AND deleted_at IS NULL
                    "#,
                )
                .bind(id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                deleted += result.rows_affected();
            }

            tx.commit().await.map_err(map_sqlx_error)?;
            debug!(requests = batch.len(), deleted, "applied deletion batch");
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> bool {
        let result = self
            .bounded(async {
                let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
                conn.ping().await.map_err(map_sqlx_error)
            })
            .await;

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "postgres ping failed");
                false
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("closed postgres url store");
        Ok(())
    }
}
