//! Deduplicating link store
//!
//! The store is the single authority on whether a link has been seen before.
//! `accept` is an atomic check-and-insert: when two sessions race to record
//! the same link, exactly one of them gets [`AcceptOutcome::Inserted`].

mod memory;
mod sqlite;

pub use memory::MemoryLinkStore;
pub use sqlite::SqliteLinkStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A discovered resource locator, optionally tagged with a category
///
/// The uniqueness key is `url` exactly as reported by the page: no
/// trimming, no case folding, no normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub category: Option<String>,
}

impl Link {
    #[must_use]
    pub fn new(url: impl Into<String>, category: Option<String>) -> Self {
        Self {
            url: url.into(),
            category,
        }
    }
}

/// Result of offering a link to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// First time this link was ever accepted; it is now recorded
    Inserted,
    /// Already recorded earlier; drop it silently
    Duplicate,
}

/// Error types for link store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not open or create the backing database
    #[error("Failed to connect to link store: {0}")]
    Connect(String),

    /// A statement failed
    #[error("Link store query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Table names are interpolated into SQL, so only plain identifiers are allowed
    #[error("Invalid table name '{0}': use letters, digits and underscores only")]
    InvalidTable(String),

    /// Store was closed
    #[error("Link store is closed")]
    Closed,
}

/// Storage backend enforcing at-most-once acceptance of a link
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Establish the uniqueness constraint on the link column
    ///
    /// Idempotent. Called once at process start, before any session runs.
    async fn ensure_unique_index(&self) -> Result<(), StoreError>;

    /// Record `link` unless it was recorded before
    async fn accept(&self, link: &Link) -> Result<AcceptOutcome, StoreError>;

    /// Release connections; later calls to `accept` fail
    async fn close(&self);
}

/// Whether `name` is safe to interpolate as an SQL identifier
pub(crate) fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("links"));
        assert!(is_valid_table_name("_waitforplot2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2links"));
        assert!(!is_valid_table_name("links; DROP TABLE links"));
        assert!(!is_valid_table_name("my-links"));
        assert!(!is_valid_table_name(&"a".repeat(65)));
    }
}
