//! Core types and traits for the Tether URL shortener.
//!
//! This crate provides the record model, the storage error taxonomy and the
//! [`Repository`] contract shared by every storage backend, the deletion
//! pipeline and the shortener service.

pub mod error;
pub mod record;
pub mod repository;

pub use error::{Result, StorageError};
pub use record::{DeletionRequest, ShortenedUrl, UrlRecord};
pub use repository::Repository;
