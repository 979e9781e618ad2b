//! In-process link store for ephemeral runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AcceptOutcome, Link, LinkStore, StoreError};

/// Link store that forgets everything when the process exits
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    links: Mutex<HashMap<String, Option<String>>>,
    closed: AtomicBool,
}

impl MemoryLinkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }

    /// Category recorded for `url`, if the link is known
    #[must_use]
    pub fn category_of(&self, url: &str) -> Option<Option<String>> {
        self.links.lock().get(url).cloned()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn ensure_unique_index(&self) -> Result<(), StoreError> {
        // HashMap keys are unique already
        Ok(())
    }

    async fn accept(&self, link: &Link) -> Result<AcceptOutcome, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let mut links = self.links.lock();
        if links.contains_key(&link.url) {
            return Ok(AcceptOutcome::Duplicate);
        }
        links.insert(link.url.clone(), link.category.clone());
        Ok(AcceptOutcome::Inserted)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_match_only() {
        let store = MemoryLinkStore::new();
        let plain = Link::new("https://x.test/a.jpg", None);
        let upper = Link::new("https://x.test/A.jpg", None);
        let padded = Link::new("https://x.test/a.jpg ", None);

        assert_eq!(store.accept(&plain).await.unwrap(), AcceptOutcome::Inserted);
        assert_eq!(store.accept(&upper).await.unwrap(), AcceptOutcome::Inserted);
        assert_eq!(store.accept(&padded).await.unwrap(), AcceptOutcome::Inserted);
        assert_eq!(store.accept(&plain).await.unwrap(), AcceptOutcome::Duplicate);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_first_category_wins() {
        let store = MemoryLinkStore::new();
        store
            .accept(&Link::new("u", Some("cats".into())))
            .await
            .unwrap();
        let second = store
            .accept(&Link::new("u", Some("dogs".into())))
            .await
            .unwrap();

        assert_eq!(second, AcceptOutcome::Duplicate);
        assert_eq!(store.category_of("u"), Some(Some("cats".to_string())));
    }

    #[tokio::test]
    async fn test_closed_store_rejects() {
        let store = MemoryLinkStore::new();
        store.close().await;
        assert!(matches!(
            store.accept(&Link::new("u", None)).await,
            Err(StoreError::Closed)
        ));
    }
}
