use rusqlite::ErrorCode;
use thiserror::Error;

/// Main error type for Followgraph
#[derive(Error, Debug)]
pub enum FollowGraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input: self-follow, bad id, bad cursor
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Target user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Viewer may not see a private account's graph
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or malformed caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transition attempted from the wrong persisted state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Surfaced from the rate-limit collaborator
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transaction failure that is safe to retry as a whole
    #[error("Storage error: {0}")]
    Storage(String),

    /// A collaborator (user directory, webhook) failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Insert lost a uniqueness race on (follower_id, followee_id).
    /// Never leaves the crate: the follow service re-reads and reports a no-op.
    #[error("Edge already exists")]
    EdgeExists,
}

impl FollowGraphError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) | Self::EdgeExists => 409,
            Self::RateLimited(_) => 429,
            Self::Upstream(_) => 502,
            Self::Database(_) | Self::Io(_) | Self::Config(_) | Self::Storage(_) => 500,
        }
    }

    /// Short machine-readable kind used in JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) | Self::EdgeExists => "conflict",
            Self::RateLimited(_) => "rate_limited",
            Self::Upstream(_) => "upstream_error",
            Self::Database(_) | Self::Io(_) | Self::Config(_) | Self::Storage(_) => "storage_error",
        }
    }

    /// Whether the whole operation can be retried unchanged.
    ///
    /// Write transactions are all-or-nothing, so storage failures are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Storage(_) | Self::Upstream(_) | Self::RateLimited(_)
        )
    }

    /// True when a rusqlite error is a uniqueness/primary-key violation
    pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
        )
    }
}

/// Convenient Result type using FollowGraphError
pub type Result<T> = std::result::Result<T, FollowGraphError>;
