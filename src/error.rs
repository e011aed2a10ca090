//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors (e.g., [`SessionError`], [`EnrichmentError`]) for detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! None of these errors are fatal to the playback loop: the queue manager
//! logs them and carries on with in-memory state.
//!
//! [`SessionError`]: crate::session::SessionError
//! [`EnrichmentError`]: crate::enrichment::EnrichmentError

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata cache database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session persistence error
    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    /// Remote catalog or metadata resolution error
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] crate::enrichment::EnrichmentError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Playback process error
    #[error("Playback error: {0}")]
    Playback(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a playback error.
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(crate::session::SessionError::NotFound("abc123".into()));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::playback("player exited with status 2").context("while playing item");
        let msg = err.to_string();
        assert!(msg.contains("while playing item"));
        assert!(msg.contains("status 2"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::playback("test"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));
    }

    #[test]
    fn test_io_result_ext() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.with_context("opening cache").unwrap_err();
        assert!(matches!(err, Error::WithContext { .. }));
        assert!(err.to_string().starts_with("opening cache"));
    }
}
