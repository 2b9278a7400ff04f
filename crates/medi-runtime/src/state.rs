//! Send-cycle states.

use serde::Serialize;

/// Where the controller is in a send cycle.
///
/// `Idle → ConversationResolving → AwaitingFirstByte → Streaming →
/// Persisting → Idle`. `Errored` can follow any non-idle state and is always
/// followed by `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Ready for input.
    #[default]
    Idle,
    /// Creating or reusing the conversation and recording the user turn.
    ConversationResolving,
    /// Request sent, waiting for the endpoint to accept it.
    AwaitingFirstByte,
    /// Fragments are arriving.
    Streaming,
    /// Recording the assistant turn.
    Persisting,
    /// The cycle failed; a notice was raised.
    Errored,
}

impl SessionState {
    /// Whether a cycle is in flight.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ConversationResolving => "conversation_resolving",
            Self::AwaitingFirstByte => "awaiting_first_byte",
            Self::Streaming => "streaming",
            Self::Persisting => "persisting",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}
