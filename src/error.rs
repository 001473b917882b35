//! Error taxonomy for the curation core.
//!
//! Every public store or curation operation translates its internal failures
//! into one of these kinds. Read failures never surface here: stores fail open
//! on read and only report write failures.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for curation operations.
pub type Result<T> = std::result::Result<T, CurationError>;

/// Unified curation error type.
#[derive(Error, Debug)]
pub enum CurationError {
    /// The referenced URL is absent from the store the operation expected.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// A quota of zero or less was supplied to the selector.
    #[error("invalid quota {0}: quota must be at least 1")]
    InvalidQuota(i64),

    /// The archive category is not one of the known partitions.
    #[error("invalid category '{0}'")]
    InvalidCategory(String),

    /// Persisting a store file failed.
    #[error("failed to write store {}: {source}", path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single scrape source failed.
    #[error("source '{source_name}' failed: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    /// A digest was prepared but no notifier confirmed delivery.
    #[error("delivery failed: no notifier accepted the digest of {count} items")]
    Delivery { count: usize },

    /// Configuration could not be used.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CurationError {
    /// Create a not-found error for a URL.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    /// Create a store write error.
    pub fn store_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a source fetch error.
    pub fn source_fetch(source_name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SourceFetch {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// HTTP-equivalent status for an outer API layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidQuota(_) | Self::InvalidCategory(_) => 400,
            Self::SourceFetch { .. } | Self::Delivery { .. } => 502,
            Self::StoreWrite { .. } | Self::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CurationError::not_found("https://a.example").status_code(), 404);
        assert_eq!(CurationError::InvalidQuota(0).status_code(), 400);
        assert_eq!(
            CurationError::InvalidCategory("misc".into()).status_code(),
            400
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ro");
        assert_eq!(CurationError::store_write("x.json", io).status_code(), 500);
        assert_eq!(CurationError::Delivery { count: 3 }.status_code(), 502);
        assert_eq!(CurationError::Config("bad".into()).status_code(), 500);
    }

    #[test]
    fn test_display_mentions_url() {
        let err = CurationError::not_found("https://a.example/post");
        assert!(err.to_string().contains("https://a.example/post"));
    }
}
