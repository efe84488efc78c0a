use crate::{Result, TestInfraError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use tracing::debug;
use typed_builder::TypedBuilder;

const POSTGRES_PORT: u16 = 5432;

#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresConfig {
    #[builder(default = "tether".to_string())]
    database: String,
    #[builder(default = "tether".to_string())]
    username: String,
    #[builder(default = "tether".to_string())]
    password: String,
    /// How often [`PostgresServer::connect`] tries before giving up.
    #[builder(default = 20)]
    connect_attempts: u32,
    #[builder(default = Duration::from_millis(500))]
    connect_backoff: Duration,
}

/// Test fixture for a disposable PostgreSQL server.
///
/// The container is removed when the fixture is dropped.
pub struct PostgresServer {
    container: ContainerAsync<GenericImage>,
    config: PostgresConfig,
}

impl PostgresServer {
    /// Starts a PostgreSQL container.
    ///
    /// The image logs readiness once during initdb as well, so the server
    /// may still restart after this returns. Use [`PostgresServer::connect`]
    /// for the first connection.
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        let container = GenericImage::new("postgres", "17-alpine")
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// Opens a pool of at most `max_connections`, retrying while the server
    /// finishes starting up.
    pub async fn connect(&self, max_connections: u32) -> Result<PgPool> {
        let url = self.database_url().await?;
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(&url)
                .await
            {
                Ok(pool) => return Ok(pool),
                Err(source) if attempt >= attempts => {
                    return Err(TestInfraError::Connect { attempts, source });
                }
                Err(err) => {
                    debug!(attempt, error = %err, "postgres not ready yet");
                    tokio::time::sleep(self.config.connect_backoff).await;
                }
            }
        }
    }

    /// Host reachable from the test process; `localhost` is pinned to IPv4.
    pub async fn host(&self) -> Result<String> {
        let host = self.container.get_host().await?.to_string();

        Ok(match host.as_str() {
            "localhost" => String::from("127.0.0.1"),
            _ => host,
        })
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(POSTGRES_PORT).await?)
    }

    pub async fn database_url(&self) -> Result<String> {
        let host = self.host().await?;
        let port = self.port().await?;
        Ok(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }
}
