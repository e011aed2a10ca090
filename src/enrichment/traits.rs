//! Trait definitions for the collaborators around the queue.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the yt-dlp and MusicBrainz implementations, while
//! tests substitute the mocks below.
//!
//! # Example
//!
//! ```ignore
//! use playstream::enrichment::traits::RemoteCatalog;
//!
//! async fn list<C: RemoteCatalog>(catalog: &C, source: &str) {
//!     let locators = catalog.fetch(source).await?;
//! }
//! ```

use async_trait::async_trait;

use super::EnrichmentError;
use crate::model::Descriptor;

/// Resolves a locator into a descriptor.
///
/// Must never fail: on any internal error it returns
/// [`Descriptor::failed`] built from the hint.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, locator: &str, hint: Option<&Descriptor>) -> Descriptor;
}

/// Lists the locators of a remote playlist or catalog.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<Vec<String>, EnrichmentError>;
}

/// Cheap first-pass metadata straight from the remote service.
#[async_trait]
pub trait BaselineLookup: Send + Sync {
    async fn lookup(&self, locator: &str) -> Result<Descriptor, EnrichmentError>;
}

/// Catalog text search by artist and title.
///
/// `Ok(None)` means the search ran and found nothing usable.
#[async_trait]
pub trait TextSearchApi: Send + Sync {
    async fn search(&self, artist: &str, title: &str)
    -> Result<Option<Descriptor>, EnrichmentError>;
}

#[async_trait]
impl TextSearchApi for super::musicbrainz::MusicBrainzClient {
    async fn search(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Option<Descriptor>, EnrichmentError> {
        self.search_recording(artist, title).await
    }
}

/// Mock collaborators for testing.
///
/// Return configurable responses for testing different scenarios.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Resolver returning canned descriptors per locator.
    #[derive(Default)]
    pub struct MockResolver {
        /// Descriptors by locator; unknown locators get `Descriptor::failed`
        pub descriptors: HashMap<String, Descriptor>,
        /// Simulated resolution latency
        pub delay: Option<Duration>,
        /// Panic instead of returning
        pub panics: bool,
        /// Locators in call order
        pub calls: Mutex<Vec<String>>,
        /// Concurrent calls right now / highest seen
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl MockResolver {
        /// Every call fails (returns the failed baseline).
        pub fn failing() -> Self {
            Self::default()
        }

        /// Every call panics.
        pub fn panicking() -> Self {
            Self {
                panics: true,
                ..Default::default()
            }
        }

        pub fn with(mut self, locator: &str, descriptor: Descriptor) -> Self {
            self.descriptors.insert(locator.to_string(), descriptor);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl MetadataResolver for MockResolver {
        async fn resolve(&self, locator: &str, hint: Option<&Descriptor>) -> Descriptor {
            self.calls.lock().push(locator.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panics {
                panic!("mock resolver panic for {}", locator);
            }
            self.descriptors
                .get(locator)
                .cloned()
                .unwrap_or_else(|| Descriptor::failed(hint))
        }
    }

    /// Catalog returning fixed listings per source.
    #[derive(Default)]
    pub struct MockCatalog {
        pub listings: HashMap<String, Result<Vec<String>, EnrichmentError>>,
    }

    impl MockCatalog {
        pub fn with(mut self, source: &str, locators: Vec<String>) -> Self {
            self.listings.insert(source.to_string(), Ok(locators));
            self
        }

        pub fn with_error(mut self, source: &str, error: EnrichmentError) -> Self {
            self.listings.insert(source.to_string(), Err(error));
            self
        }
    }

    #[async_trait]
    impl RemoteCatalog for MockCatalog {
        async fn fetch(&self, source: &str) -> Result<Vec<String>, EnrichmentError> {
            self.listings
                .get(source)
                .cloned()
                .unwrap_or(Err(EnrichmentError::NoMatches))
        }
    }

    /// Baseline lookup with one fixed answer.
    pub struct MockBaseline {
        pub result: Result<Descriptor, EnrichmentError>,
        pub calls: AtomicUsize,
    }

    impl MockBaseline {
        pub fn returning(descriptor: Descriptor) -> Self {
            Self {
                result: Ok(descriptor),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_error(error: EnrichmentError) -> Self {
            Self {
                result: Err(error),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BaselineLookup for MockBaseline {
        async fn lookup(&self, _locator: &str) -> Result<Descriptor, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Text search with one fixed answer.
    pub struct MockTextSearch {
        pub result: Result<Option<Descriptor>, EnrichmentError>,
        pub calls: AtomicUsize,
    }

    impl MockTextSearch {
        pub fn no_matches() -> Self {
            Self {
                result: Ok(None),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn single_match(descriptor: Descriptor) -> Self {
            Self {
                result: Ok(Some(descriptor)),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_error(error: EnrichmentError) -> Self {
            Self {
                result: Err(error),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextSearchApi for MockTextSearch {
        async fn search(
            &self,
            _artist: &str,
            _title: &str,
        ) -> Result<Option<Descriptor>, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::test_utils::mock_descriptor;

        #[tokio::test]
        async fn test_mock_resolver_known_and_unknown() {
            let mock = MockResolver::failing().with("a", mock_descriptor());
            assert_eq!(mock.resolve("a", None).await, mock_descriptor());

            let failed = mock.resolve("b", None).await;
            assert_eq!(failed.confidence, 0.0);
            assert!(failed.fingerprint_attempted);
            assert_eq!(mock.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_catalog_error() {
            let mock = MockCatalog::default()
                .with_error("bad", EnrichmentError::Network("timeout".to_string()));
            assert!(matches!(
                mock.fetch("bad").await,
                Err(EnrichmentError::Network(_))
            ));
        }
    }
}
