mod cli;

use crate::cli::{Command, LogFormat, CLI};
use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tether_cleaner::{Cleaner, CleanerSettings};
use tether_core::Repository;
use tether_generator::{RandomGenerator, RandomGeneratorSettings};
use tether_shortener::{BatchItem, Shortened, UrlService};
use tether_storage::{AnyRepository, StorageBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Service = UrlService<AnyRepository, RandomGenerator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let backend = StorageBackend::select(config.file_storage_path, config.database_dsn);
    info!(
        backend = %backend,
        base_url = %config.base_url,
        delete_interval_ms = config.delete_interval_ms,
        "starting tether"
    );

    let repository = Arc::new(backend.open().await.context("failed to open url store")?);

    let cleaner = Cleaner::new(
        Arc::clone(&repository),
        CleanerSettings::builder()
            .flush_interval(Duration::from_millis(config.delete_interval_ms))
            .build(),
    );
    let generator = RandomGenerator::new(
        RandomGeneratorSettings::builder()
            .length(usize::from(config.id_length))
            .build(),
    );
    let service = UrlService::new(
        Arc::clone(&repository),
        generator,
        cleaner.queue(),
        config.base_url,
    );

    let handle = cleaner.run();
    let outcome = execute(&service, config.command).await;

    // Queued deletions are flushed before the store goes away.
    handle.shutdown().await;
    repository
        .close()
        .await
        .context("failed to close url store")?;

    outcome
}

async fn execute(service: &Service, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => match service.shorten(&url, &owner).await? {
            Shortened::Created(short_url) => println!("{short_url}"),
            Shortened::Existing(short_url) => println!("{short_url} (existing)"),
        },
        Command::ShortenBatch { urls, owner } => {
            let items = urls
                .into_iter()
                .enumerate()
                .map(|(index, url)| BatchItem::new(url).with_correlation_id(index.to_string()))
                .collect();

            for link in service.shorten_batch(items, &owner).await? {
                println!("{}\t{}", link.short_url, link.original_url);
            }
        }
        Command::Expand { id } => println!("{}", service.expand(&id).await?),
        Command::List { owner } => {
            for link in service.list(&owner).await? {
                println!("{}\t{}", link.short_url, link.original_url);
            }
        }
        Command::Delete { ids, owner } => {
            let count = ids.len();
            service.delete(&owner, ids);
            println!("queued {count} id(s) for deletion");
        }
        Command::Ping => {
            if !service.ping().await {
                bail!("url store is unreachable");
            }
            println!("ok");
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
