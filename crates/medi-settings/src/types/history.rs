//! History listing limits.

use serde::{Deserialize, Serialize};

/// Limits applied when titling and summarising conversations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistorySettings {
    /// Most recent messages fetched per conversation for a listing preview.
    pub preview_limit: usize,
    /// Characters kept from the previewed user message.
    pub preview_chars: usize,
    /// Characters of the first user message used as a conversation title.
    pub title_chars: usize,
    /// Login records returned by the login history view.
    pub login_history_limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            preview_limit: 3,
            preview_chars: 100,
            title_chars: 50,
            login_history_limit: 50,
        }
    }
}
