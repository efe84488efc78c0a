//! URL shortening service.
//!
//! [`UrlService`] ties a record store, an id generator and the deletion
//! pipeline together. The `tether` binary drives it from the command line.

pub mod error;
pub mod service;

pub use error::{Result, ShortenerError};
pub use service::{BatchItem, ShortLink, Shortened, UrlService};
