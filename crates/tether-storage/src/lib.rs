//! Record store backends for Tether.
//!
//! Three interchangeable [`Repository`] implementations are provided:
//! [`InMemoryRepository`] for process-lifetime storage, [`FileRepository`]
//! which mirrors the store into a single snapshot file, and
//! [`PostgresRepository`]. [`StorageBackend`] selects one of them from
//! configuration.

pub mod backend;
pub mod file;
pub mod memory;
pub mod postgres;
mod table;

pub use backend::{AnyRepository, StorageBackend};
pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::{PostgresRepository, PostgresSettings};
pub use tether_core::{DeletionRequest, Repository, ShortenedUrl, StorageError, UrlRecord};
