//! Test utilities and fixtures for playstream tests.
//!
//! Common helpers for temporary stores and canned descriptors, to reduce
//! boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use playstream::test_utils::{temp_cache, mock_descriptor};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (cache, _dir) = temp_cache().await;
//!     cache.put("x", &mock_descriptor()).await.unwrap();
//! }
//! ```

use tempfile::TempDir;

use crate::cache::MetadataCache;
use crate::model::{Descriptor, Provenance};
use crate::session::SessionStore;

/// Creates a metadata cache in a temporary directory.
///
/// Keep the `TempDir` alive for the duration of your test; the database
/// is deleted when it goes out of scope.
pub async fn temp_cache() -> (MetadataCache, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let cache = MetadataCache::open(&dir.path().join("cache.db"), 30)
        .await
        .expect("Failed to open test cache");
    (cache, dir)
}

/// Creates a session store rooted directly in a temporary directory.
pub fn temp_sessions() -> (SessionStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let store = SessionStore::open(dir.path()).expect("Failed to open session store");
    (store, dir)
}

/// A descriptor that counts as complete at the default 0.7 threshold.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let weak = Descriptor {
///     confidence: 0.1,
///     ..mock_descriptor()
/// };
/// ```
pub fn mock_descriptor() -> Descriptor {
    Descriptor {
        title: "Test Song".to_string(),
        artist: "Test Artist".to_string(),
        album: "Test Album".to_string(),
        duration_secs: 180,
        track_number: Some(1),
        confidence: 0.9,
        provenance: Provenance::BaselineLookup,
        ..Default::default()
    }
}

/// `n` distinct remote locators.
pub fn remote_locators(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("https://example.com/watch?v={}", i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_cache_starts_empty() {
        let (cache, _dir) = temp_cache().await;
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[test]
    fn test_mock_descriptor_is_complete() {
        let d = mock_descriptor();
        assert!(d.is_complete(0.7));
        assert!(d.is_preferred(0.7));
    }

    #[test]
    fn test_remote_locators_are_unique() {
        let locators = remote_locators(5);
        let mut deduped = locators.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 5);
        assert!(temp_sessions().0.list_sessions().is_empty());
    }
}
