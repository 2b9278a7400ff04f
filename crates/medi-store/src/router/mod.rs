//! Identity-aware history routing.
//!
//! An authenticated identity reads and writes the structured store scoped to
//! its account. The anonymous identity uses the local key-value slot. The
//! choice is made per call from the identity passed in, so switching
//! identity never carries a conversation across backends.

pub mod local;
pub mod remote;

use std::sync::Arc;

use medi_core::conversation::{ConversationSummary, Identity};
use medi_core::ids::{AccountId, ConversationId};
use medi_core::messages::Message;
use tracing::{debug, instrument};

use crate::errors::Result;
use crate::provider::{KeyValueStore, StructuredStore};

pub use local::{HISTORY_KEY, LocalConversation, LocalHistory};
pub use remote::RemoteHistory;

/// Listing limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Messages fetched per conversation when building a preview.
    pub preview_limit: usize,
    /// Maximum characters in a preview excerpt.
    pub preview_chars: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            preview_limit: 3,
            preview_chars: 100,
        }
    }
}

/// The backend an identity maps to.
pub enum HistoryBackend<'a> {
    /// Structured store, scoped to `account`.
    Remote {
        /// Account-scoped history.
        history: &'a RemoteHistory,
        /// Owning account.
        account: &'a AccountId,
    },
    /// Anonymous key-value slot.
    Local(&'a LocalHistory),
}

/// Routes history operations to the backend selected by identity.
#[derive(Clone)]
pub struct PersistenceRouter {
    structured: Arc<dyn StructuredStore>,
    remote: RemoteHistory,
    local: LocalHistory,
}

impl PersistenceRouter {
    /// Router over both backends.
    pub fn new(
        structured: Arc<dyn StructuredStore>,
        kv: Arc<dyn KeyValueStore>,
        limits: HistoryLimits,
    ) -> Self {
        Self {
            remote: RemoteHistory::new(Arc::clone(&structured), limits),
            local: LocalHistory::new(kv, limits),
            structured,
        }
    }

    /// The structured store, for account-scoped data outside chat history.
    pub fn structured(&self) -> &Arc<dyn StructuredStore> {
        &self.structured
    }

    /// Backend for `identity`.
    pub fn backend<'a>(&'a self, identity: &'a Identity) -> HistoryBackend<'a> {
        match identity {
            Identity::Authenticated { account_id, .. } => HistoryBackend::Remote {
                history: &self.remote,
                account: account_id,
            },
            Identity::Anonymous => HistoryBackend::Local(&self.local),
        }
    }

    /// Return the current conversation or create one.
    ///
    /// With `Some(id)` nothing is written and `id` comes back unchanged.
    #[instrument(skip_all, fields(identity = %identity.label()))]
    pub async fn resolve_conversation(
        &self,
        identity: &Identity,
        conversation: Option<&ConversationId>,
        title_hint: Option<&str>,
    ) -> Result<ConversationId> {
        match self.backend(identity) {
            HistoryBackend::Remote { history, account } => {
                history
                    .resolve_conversation(account, conversation, title_hint)
                    .await
            }
            HistoryBackend::Local(history) => {
                history.resolve_conversation(conversation, title_hint).await
            }
        }
    }

    /// Durably append one message to `conversation`.
    #[instrument(skip_all, fields(identity = %identity.label(), conversation_id = %conversation, role = %message.role))]
    pub async fn record_turn(
        &self,
        identity: &Identity,
        conversation: &ConversationId,
        message: &Message,
    ) -> Result<()> {
        match self.backend(identity) {
            HistoryBackend::Remote { history, account } => {
                history.record_turn(account, conversation, message).await
            }
            HistoryBackend::Local(history) => history.record_turn(conversation, message).await,
        }?;
        debug!("turn recorded");
        Ok(())
    }

    /// Conversations for `identity`, most recently updated first.
    #[instrument(skip_all, fields(identity = %identity.label()))]
    pub async fn list_conversations(&self, identity: &Identity) -> Result<Vec<ConversationSummary>> {
        match self.backend(identity) {
            HistoryBackend::Remote { history, account } => history.list_conversations(account).await,
            HistoryBackend::Local(history) => history.list_conversations().await,
        }
    }

    /// Delete a conversation owned by `identity`. Returns whether one was removed.
    #[instrument(skip_all, fields(identity = %identity.label(), conversation_id = %conversation))]
    pub async fn delete_conversation(
        &self,
        identity: &Identity,
        conversation: &ConversationId,
    ) -> Result<bool> {
        match self.backend(identity) {
            HistoryBackend::Remote { history, account } => {
                history.delete_conversation(account, conversation).await
            }
            HistoryBackend::Local(history) => history.delete_conversation(conversation).await,
        }
    }
}
