//! Conversations and session identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, ConversationId};

/// A named, timestamped container of messages.
///
/// The message list itself lives in the backing store; this is the header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Store-specific reference.
    pub id: ConversationId,
    /// Human label, set at most once when the conversation is created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Advances on every appended message.
    pub updated_at: DateTime<Utc>,
}

/// One row of a conversation listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Store-specific reference.
    pub id: ConversationId,
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity.
    pub updated_at: DateTime<Utc>,
    /// Number of messages seen while building the summary.
    pub message_count: usize,
    /// Excerpt of the most recent user message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Who is using the session. Decides which store backs the history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Identity {
    /// Signed-in account; history lives in the remote structured store.
    #[serde(rename_all = "camelCase")]
    Authenticated {
        /// Owning account.
        account_id: AccountId,
        /// Contact email reported by the identity provider.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        /// Contact phone reported by the identity provider.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
    },
    /// No account; history lives in the local key-value slot.
    #[default]
    Anonymous,
}

impl Identity {
    /// Authenticated identity with only an account ID.
    pub fn account(account_id: impl Into<AccountId>) -> Self {
        Self::Authenticated {
            account_id: account_id.into(),
            email: None,
            phone: None,
        }
    }

    /// The owning account, if authenticated.
    pub fn account_id(&self) -> Option<&AccountId> {
        match self {
            Self::Authenticated { account_id, .. } => Some(account_id),
            Self::Anonymous => None,
        }
    }

    /// Whether this is the anonymous identity.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Short label for logs (`"anonymous"` or the account ID).
    pub fn label(&self) -> &str {
        match self {
            Self::Authenticated { account_id, .. } => account_id.as_str(),
            Self::Anonymous => "anonymous",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
