//! Metadata enrichment - lists remote catalogs and resolves descriptors.
//!
//! # Architecture
//!
//! - **Traits** (`traits.rs`) - seams for the external tools and services,
//!   with mock implementations for tests
//! - **yt-dlp** (`ytdlp.rs`) - playlist listing and baseline lookups via the
//!   `yt-dlp` command-line tool
//! - **MusicBrainz** (`musicbrainz/`) - recording text search, split into
//!   client, DTOs and adapter
//! - **Service** (`service.rs`) - the tiered resolver the queue workers call
//!
//! Nothing outside this module touches DTOs; adapters convert them into
//! [`Descriptor`](crate::model::Descriptor)s.

pub mod musicbrainz;
pub mod service;
pub mod traits;
pub mod ytdlp;

pub use musicbrainz::MusicBrainzClient;
pub use service::{ResolverSettings, TieredResolver};
pub use traits::{BaselineLookup, MetadataResolver, RemoteCatalog, TextSearchApi};
pub use ytdlp::YtDlp;

/// Errors from external catalog and metadata services
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Failed to run {program}: {message}")]
    Tool { program: String, message: String },

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No matches found")]
    NoMatches,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl EnrichmentError {
    pub fn tool(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            program: program.into(),
            message: message.into(),
        }
    }
}
