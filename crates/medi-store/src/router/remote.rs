//! Authenticated history in the structured store.

use std::sync::Arc;

use futures::future::join_all;
use medi_core::conversation::{Conversation, ConversationSummary};
use medi_core::ids::{AccountId, ConversationId};
use medi_core::messages::{Message, Role};
use medi_core::text::take_chars;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::errors::{Result, StoreError};
use crate::provider::StructuredStore;
use crate::query::{
    Collection, Filter, Query, Row, get_str, require_id, require_timestamp, timestamp_now,
};

use super::HistoryLimits;

/// Conversations and messages as rows owned by an account.
#[derive(Clone)]
pub struct RemoteHistory {
    store: Arc<dyn StructuredStore>,
    limits: HistoryLimits,
}

impl RemoteHistory {
    /// History over `store`.
    pub fn new(store: Arc<dyn StructuredStore>, limits: HistoryLimits) -> Self {
        Self { store, limits }
    }

    /// Return `conversation` unchanged, or create a new one titled `title_hint`.
    pub async fn resolve_conversation(
        &self,
        account: &AccountId,
        conversation: Option<&ConversationId>,
        title_hint: Option<&str>,
    ) -> Result<ConversationId> {
        if let Some(existing) = conversation {
            return Ok(existing.clone());
        }
        let now = timestamp_now();
        let row = into_row(json!({
            "user_id": account.as_str(),
            "title": title_hint,
            "created_at": now,
            "updated_at": now,
        }));
        let inserted = self.store.insert(Collection::Conversations, row).await?;
        let id = ConversationId::from(require_id(&inserted)?);
        debug!(conversation_id = %id, account = %account, "created conversation");
        Ok(id)
    }

    /// Advance the conversation's `updated_at` and insert `message`.
    ///
    /// Fails with [`StoreError::NotFound`] and writes nothing when the account
    /// does not own the conversation.
    pub async fn record_turn(
        &self,
        account: &AccountId,
        conversation: &ConversationId,
        message: &Message,
    ) -> Result<()> {
        let now = timestamp_now();
        let touched = self
            .store
            .update(
                Collection::Conversations,
                &owned_by(account, conversation),
                into_row(json!({ "updated_at": now })),
            )
            .await?;
        if touched == 0 {
            warn!(conversation_id = %conversation, account = %account, "turn rejected: conversation not owned by account");
            return Err(StoreError::NotFound(format!(
                "conversation {conversation} for account {account}"
            )));
        }

        let row = into_row(json!({
            "conversation_id": conversation.as_str(),
            "role": message.role.as_str(),
            "content": message.content,
            "created_at": now,
        }));
        let _ = self.store.insert(Collection::Messages, row).await?;
        Ok(())
    }

    /// Account's conversations, most recently updated first, with previews.
    ///
    /// Previews are fetched concurrently; results keep listing order. A
    /// failed preview fetch leaves that summary without a preview.
    pub async fn list_conversations(&self, account: &AccountId) -> Result<Vec<ConversationSummary>> {
        let rows = self
            .store
            .select(
                &Query::new(Collection::Conversations)
                    .eq("user_id", account.as_str())
                    .order_desc("updated_at"),
            )
            .await?;
        let conversations = rows
            .iter()
            .map(conversation_from_row)
            .collect::<Result<Vec<_>>>()?;

        let previews = join_all(conversations.iter().map(|c| self.preview(&c.id))).await;

        Ok(conversations
            .into_iter()
            .zip(previews)
            .map(|(conversation, preview)| {
                let recent = preview.unwrap_or_else(|e| {
                    warn!(conversation_id = %conversation.id, error = %e, "failed to load preview");
                    Vec::new()
                });
                summarize(conversation, &recent, self.limits.preview_chars)
            })
            .collect())
    }

    /// Delete the conversation if the account owns it. Messages cascade.
    pub async fn delete_conversation(
        &self,
        account: &AccountId,
        conversation: &ConversationId,
    ) -> Result<bool> {
        let removed = self
            .store
            .delete(Collection::Conversations, &owned_by(account, conversation))
            .await?;
        Ok(removed > 0)
    }

    /// Most recent messages, newest first.
    async fn preview(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        let rows = self
            .store
            .select(
                &Query::new(Collection::Messages)
                    .eq("conversation_id", conversation.as_str())
                    .order_desc("created_at")
                    .limit(self.limits.preview_limit),
            )
            .await?;
        rows.iter().map(message_from_row).collect()
    }
}

fn owned_by(account: &AccountId, conversation: &ConversationId) -> [Filter; 2] {
    [
        Filter::eq("id", conversation.as_str()),
        Filter::eq("user_id", account.as_str()),
    ]
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn conversation_from_row(row: &Row) -> Result<Conversation> {
    Ok(Conversation {
        id: ConversationId::from(require_id(row)?),
        title: get_str(row, "title").map(String::from),
        created_at: require_timestamp(row, "created_at")?,
        updated_at: require_timestamp(row, "updated_at")?,
    })
}

fn message_from_row(row: &Row) -> Result<Message> {
    let role = get_str(row, "role")
        .and_then(Role::parse)
        .ok_or_else(|| StoreError::InvalidRow("message role".into()))?;
    let content = get_str(row, "content").unwrap_or_default();
    Ok(Message {
        role,
        content: content.to_string(),
    })
}

/// Summary over the newest-first `recent` messages.
pub(crate) fn summarize(
    conversation: Conversation,
    recent: &[Message],
    preview_chars: usize,
) -> ConversationSummary {
    let preview = recent
        .iter()
        .find(|m| m.is_user())
        .map(|m| take_chars(&m.content, preview_chars).to_string());
    ConversationSummary {
        id: conversation.id,
        title: conversation.title,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        message_count: recent.len(),
        preview,
    }
}
