use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const BASE_URL_ENV: &str = "TETHER_BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "TETHER_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "TETHER_DATABASE_DSN";
pub const DELETE_INTERVAL_ENV: &str = "TETHER_DELETE_INTERVAL_MS";
pub const ID_LENGTH_ENV: &str = "TETHER_ID_LENGTH";
pub const LOG_FORMAT_ENV: &str = "TETHER_LOG_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_DELETE_INTERVAL_MS: u64 = 100;
pub const DEFAULT_ID_LENGTH: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Shorten, expand and delete URLs")]
pub struct CLI {
    /// Prefix of every short URL.
    #[arg(long, global = true, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Snapshot file of the file-backed store.
    #[arg(long, global = true, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// PostgreSQL DSN. Takes precedence over the file store.
    #[arg(long, global = true, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Coalescing window of the deletion pipeline.
    #[arg(
        long,
        global = true,
        env = DELETE_INTERVAL_ENV,
        default_value_t = DEFAULT_DELETE_INTERVAL_MS,
    )]
    pub delete_interval_ms: u64,

    /// Length of generated short ids. At least 1.
    #[arg(
        long,
        global = true,
        env = ID_LENGTH_ENV,
        default_value_t = DEFAULT_ID_LENGTH,
        value_parser = clap::value_parser!(u16).range(1..),
    )]
    pub id_length: u16,

    #[arg(
        long,
        global = true,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL.
    Shorten {
        url: String,
        #[arg(long)]
        owner: String,
    },
    /// Shorten several URLs at once; all or none are stored.
    ShortenBatch {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long)]
        owner: String,
    },
    /// Print the original URL behind a short id.
    Expand { id: String },
    /// List the URLs of an owner.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Delete short ids of an owner.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        owner: String,
    },
    /// Check that the store is reachable.
    Ping,
}
