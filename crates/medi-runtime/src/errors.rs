//! Session operation errors.

/// Why a session operation was refused or failed.
///
/// `Busy` and `EmptyInput` never change session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A send cycle is already in flight.
    #[error("Session busy: a response is still streaming")]
    Busy,

    /// The input was empty or whitespace.
    #[error("Message is empty")]
    EmptyInput,

    /// History lookup or deletion failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] medi_store::StoreError),
}

impl SessionError {
    /// Error category string for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Busy => "session_busy",
            Self::EmptyInput => "empty_input",
            Self::Persistence(_) => "persistence",
        }
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(SessionError::Busy.category(), "session_busy");
        assert_eq!(SessionError::EmptyInput.category(), "empty_input");
        let err = SessionError::from(medi_store::StoreError::NotFound("c1".into()));
        assert_eq!(err.category(), "persistence");
        assert_eq!(err.to_string(), "Persistence error: not found: c1");
    }
}
