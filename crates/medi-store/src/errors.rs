//! Error types for the persistence layer.
//!
//! [`StoreError`] is returned by every provider and by the router. The
//! session controller never aborts on one; it logs it and raises a notice.

use thiserror::Error;

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// HTTP request to the hosted store failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error in a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The hosted store rejected the request.
    #[error("store API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// Requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A row is missing a required field or has the wrong type.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A query names an unknown column or has no filters where one is required.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Internal error (e.g. a failed blocking task).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn api_error_display() {
        let err = StoreError::Api {
            status: 401,
            message: "JWT expired".into(),
        };
        assert_eq!(err.to_string(), "store API error (401): JWT expired");
    }

    #[test]
    fn invalid_query_display() {
        let err = StoreError::InvalidQuery("unknown column bogus".into());
        assert_eq!(err.to_string(), "invalid query: unknown column bogus");
    }
}
