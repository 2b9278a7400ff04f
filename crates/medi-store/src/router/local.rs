//! Anonymous history in a single key-value slot.
//!
//! The slot holds a JSON array of conversations, most recent first. Every
//! change reads the whole array, edits it, and writes it back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medi_core::conversation::{Conversation, ConversationSummary};
use medi_core::ids::ConversationId;
use medi_core::messages::Message;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;
use crate::provider::KeyValueStore;

use super::HistoryLimits;
use super::remote::summarize;

/// Key of the anonymous history slot.
pub const HISTORY_KEY: &str = "chat-history";

/// One conversation as stored in the slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConversation {
    /// Time-based reference.
    pub id: ConversationId,
    /// Title, when one was given at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Full transcript in order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time. Older entries only carry `lastUpdated`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last append.
    pub last_updated: DateTime<Utc>,
}

impl LocalConversation {
    fn header(&self) -> Conversation {
        Conversation {
            id: self.id.clone(),
            title: Some(
                self.title
                    .clone()
                    .unwrap_or_else(|| format!("Conversation {}", self.last_updated.format("%-m/%-d/%Y"))),
            ),
            created_at: self.created_at.unwrap_or(self.last_updated),
            updated_at: self.last_updated,
        }
    }
}

/// Conversations kept in a [`KeyValueStore`] slot.
#[derive(Clone)]
pub struct LocalHistory {
    store: Arc<dyn KeyValueStore>,
    limits: HistoryLimits,
}

impl LocalHistory {
    /// History over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, limits: HistoryLimits) -> Self {
        Self { store, limits }
    }

    /// Every stored conversation, in slot order.
    pub async fn entries(&self) -> Result<Vec<LocalConversation>> {
        match self.store.get(HISTORY_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn write(&self, entries: &[LocalConversation]) -> Result<()> {
        self.store
            .set(HISTORY_KEY, serde_json::to_string(entries)?)
            .await
    }

    /// Return `conversation` unchanged, or create an empty entry at the front.
    pub async fn resolve_conversation(
        &self,
        conversation: Option<&ConversationId>,
        title_hint: Option<&str>,
    ) -> Result<ConversationId> {
        if let Some(existing) = conversation {
            return Ok(existing.clone());
        }
        let mut entries = self.entries().await?;
        let id = fresh_id(&entries);
        let now = Utc::now();
        entries.insert(
            0,
            LocalConversation {
                id: id.clone(),
                title: title_hint.map(String::from),
                messages: Vec::new(),
                created_at: Some(now),
                last_updated: now,
            },
        );
        self.write(&entries).await?;
        debug!(conversation_id = %id, "created local conversation");
        Ok(id)
    }

    /// Append `message`, creating the entry if it is missing, and move the
    /// entry to the front.
    pub async fn record_turn(&self, conversation: &ConversationId, message: &Message) -> Result<()> {
        let mut entries = self.entries().await?;
        let now = Utc::now();
        let mut entry = match entries.iter().position(|e| &e.id == conversation) {
            Some(index) => entries.remove(index),
            None => LocalConversation {
                id: conversation.clone(),
                title: None,
                messages: Vec::new(),
                created_at: Some(now),
                last_updated: now,
            },
        };
        entry.messages.push(message.clone());
        entry.last_updated = now;
        entries.insert(0, entry);
        self.write(&entries).await
    }

    /// Summaries, most recently updated first.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let mut entries = self.entries().await?;
        entries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(entries
            .iter()
            .map(|entry| {
                let newest_first: Vec<Message> = entry.messages.iter().rev().cloned().collect();
                let mut summary = summarize(entry.header(), &newest_first, self.limits.preview_chars);
                summary.message_count = entry.messages.len();
                summary
            })
            .collect())
    }

    /// Remove the entry; returns whether one existed.
    pub async fn delete_conversation(&self, conversation: &ConversationId) -> Result<bool> {
        let mut entries = self.entries().await?;
        let before = entries.len();
        entries.retain(|e| &e.id != conversation);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries).await?;
        Ok(true)
    }
}

/// Millisecond timestamp id, bumped past any id already in the slot.
fn fresh_id(entries: &[LocalConversation]) -> ConversationId {
    let mut candidate = ConversationId::local_now();
    while entries.iter().any(|e| e.id == candidate) {
        let next = candidate
            .as_str()
            .parse::<i64>()
            .map_or_else(|_| format!("{candidate}-1"), |ms| (ms + 1).to_string());
        candidate = ConversationId::from(next);
    }
    candidate
}
