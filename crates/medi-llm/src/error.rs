//! Transport error taxonomy.

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while sending a chat request or reading its response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The context was empty or did not end with a user message.
    #[error("invalid context: {message}")]
    InvalidContext {
        /// Error description.
        message: String,
    },

    /// The transport could not be built from its configuration.
    #[error("transport configuration error: {message}")]
    Config {
        /// Error description.
        message: String,
    },

    /// HTTP request failed before a status was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint rejected the request with 429.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Error description from the response body.
        message: String,
    },

    /// The endpoint rejected the request with 402.
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Error description from the response body.
        message: String,
    },

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// The response body failed after streaming started.
    #[error("Stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },
}

impl TransportError {
    /// Whether a later identical request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } | Self::Stream { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::InvalidContext { .. } | Self::Config { .. } | Self::QuotaExceeded { .. } => {
                false
            }
        }
    }

    /// Error category string for logging and event emission.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidContext { .. } => "invalid_context",
            Self::Config { .. } => "config",
            Self::Http(_) => "network",
            Self::RateLimited { .. } => "rate_limit",
            Self::QuotaExceeded { .. } => "quota",
            Self::Api { .. } => "api",
            Self::Stream { .. } => "stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        let err = TransportError::RateLimited {
            message: "slow down".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rate_limit");
    }

    #[test]
    fn quota_is_not_retryable() {
        let err = TransportError::QuotaExceeded {
            message: "add credits".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "quota");
    }

    #[test]
    fn api_retryable_only_for_server_errors() {
        let server = TransportError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        let client = TransportError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn display_includes_status() {
        let err = TransportError::Api {
            status: 500,
            message: "AI gateway error".into(),
        };
        assert_eq!(err.to_string(), "API error (500): AI gateway error");
    }

    #[test]
    fn invalid_context_category() {
        let err = TransportError::InvalidContext {
            message: "empty".into(),
        };
        assert_eq!(err.category(), "invalid_context");
        assert!(!err.is_retryable());
    }
}
