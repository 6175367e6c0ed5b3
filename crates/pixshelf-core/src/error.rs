//! Error types for pixshelf.

use std::fmt;

use thiserror::Error;

use crate::refresh::RefreshSummary;

/// Result type alias using pixshelf's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a reconciliation at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    /// Resolving or creating the owning author.
    Author,
    /// Creating or updating the image row.
    Image,
    /// Clearing old tag links or writing the new tag set.
    TagLinks,
    /// Recording page sub-assets.
    Pages,
}

impl ReconcileStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Image => "image",
            Self::TagLinks => "tag_links",
            Self::Pages => "pages",
        }
    }
}

impl fmt::Display for ReconcileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for pixshelf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found (upstream artwork gone, or local row missing)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Retryable network or upstream server failure
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// Upstream resource exists but carries no usable content (e.g. withdrawn)
    #[error("Empty body for pid {0}")]
    EmptyBody(i64),

    /// Payload is structurally incompatible (mandatory fields missing, invalid JSON)
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Upstream answered with a non-success status that is neither 404 nor retryable
    #[error("Upstream returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Duplicate entity created under a concurrent race
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Reconciliation of one pid failed at a given stage
    #[error("pid {pid}: {stage} failed: {source}")]
    Reconcile {
        pid: i64,
        stage: ReconcileStage,
        #[source]
        source: Box<Error>,
    },

    /// A bulk refresh finished with at least one failed pid
    #[error("{0}")]
    RefreshFailed(RefreshSummary),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an error with the pid and stage it occurred at.
    pub fn reconcile(pid: i64, stage: ReconcileStage, source: Error) -> Self {
        Error::Reconcile {
            pid,
            stage,
            source: Box::new(source),
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Database(_) | Error::Conflict(_) => true,
            Error::Reconcile { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The innermost error, unwrapping pid-tagged reconciliation wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Reconcile { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the upstream reported the artwork as gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            // Invalid URL or header value: retrying sends the same request.
            Error::Config(e.to_string())
        } else if e.is_decode() {
            Error::Malformed(e.to_string())
        } else {
            Error::Transient(e.to_string())
        }
    }
}
