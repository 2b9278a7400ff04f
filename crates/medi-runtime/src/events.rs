//! Session events and their broadcast emitter.

use medi_core::conversation::Identity;
use medi_core::ids::ConversationId;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::notice::Notice;
use crate::state::SessionState;
use crate::transcript::TranscriptUpdate;

/// Default broadcast buffer. Slow receivers skip ahead once it fills.
pub const DEFAULT_CAPACITY: usize = 256;

/// Everything a presentation layer can observe.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The controller moved to `state`.
    StateChanged {
        /// New state.
        state: SessionState,
    },
    /// The transcript changed.
    Transcript {
        /// What changed.
        update: TranscriptUpdate,
    },
    /// A notice for the person chatting.
    Notice {
        /// The notice.
        notice: Notice,
    },
    /// The cycle is now writing to `conversation_id`.
    #[serde(rename_all = "camelCase")]
    ConversationResolved {
        /// Resolved reference.
        conversation_id: ConversationId,
    },
    /// Identity switched; transcript and conversation were reset.
    IdentityChanged {
        /// New identity.
        identity: Identity,
    },
}

/// Fan-out of [`SessionEvent`]s to any number of subscribers.
#[derive(Debug)]
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    /// Emitter with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Emitter buffering up to `capacity` events per slow receiver.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send to current subscribers. Returns how many received it.
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// New receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Live subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
