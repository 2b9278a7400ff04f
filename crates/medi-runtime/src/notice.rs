//! Short user-facing notices raised by a send cycle.

use medi_llm::TransportError;
use serde::Serialize;

/// Why a notice was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    /// Endpoint answered 429.
    RateLimited,
    /// Endpoint answered 402.
    QuotaExceeded,
    /// Any other send or stream failure.
    TransportFailure,
    /// A history write failed. The stream is unaffected.
    PersistenceFailure,
}

impl NoticeKind {
    /// Heading text.
    pub fn title(self) -> &'static str {
        match self {
            Self::RateLimited => "Rate limit exceeded",
            Self::QuotaExceeded => "Payment required",
            Self::TransportFailure | Self::PersistenceFailure => "Error",
        }
    }

    /// Body text.
    pub fn description(self) -> &'static str {
        match self {
            Self::RateLimited => "Please try again in a moment.",
            Self::QuotaExceeded => "Please add credits to your AI workspace.",
            Self::TransportFailure => "Failed to get response. Please try again.",
            Self::PersistenceFailure => "Failed to save chat history.",
        }
    }

    /// Kind for a failed send.
    pub fn for_transport(error: &TransportError) -> Self {
        match error {
            TransportError::RateLimited { .. } => Self::RateLimited,
            TransportError::QuotaExceeded { .. } => Self::QuotaExceeded,
            _ => Self::TransportFailure,
        }
    }
}

/// A transient message for the person chatting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Classification.
    pub kind: NoticeKind,
    /// Heading.
    pub title: &'static str,
    /// Body.
    pub description: &'static str,
}

impl Notice {
    /// Notice with the fixed texts for `kind`.
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            kind,
            title: kind.title(),
            description: kind.description(),
        }
    }
}

impl From<NoticeKind> for Notice {
    fn from(kind: NoticeKind) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}
