//! Asynchronous deletion pipeline.
//!
//! Callers hand [`DeletionRequest`]s to a [`DeletionQueue`] without waiting.
//! A single background worker buffers them and, once per flush interval,
//! applies everything buffered with one [`Repository::delete`] call. Failed
//! batches are logged and dropped; deletion is best-effort.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_cleaner::{Cleaner, CleanerSettings};
//! use tether_core::DeletionRequest;
//! use tether_storage::InMemoryRepository;
//!
//! # async fn example() {
//! let repository = Arc::new(InMemoryRepository::new());
//! let cleaner = Cleaner::new(repository, CleanerSettings::default());
//! let deletions = cleaner.queue();
//! let handle = cleaner.run();
//!
//! deletions.queue(DeletionRequest::new("u1", ["qwerty"]));
//!
//! handle.shutdown().await;
//! # }
//! ```
//!
//! [`DeletionRequest`]: tether_core::DeletionRequest
//! [`Repository::delete`]: tether_core::Repository::delete

pub mod queue;
pub mod worker;

pub use queue::DeletionQueue;
pub use worker::{Cleaner, CleanerHandle, CleanerSettings, WorkerState};
