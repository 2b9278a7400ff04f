//! In-memory transcript with a single open assistant turn.
//!
//! Fragments accumulate into one running buffer. The transcript's last entry
//! is rewritten with the cumulative text on every fragment, so subscribers
//! see one mutating message rather than a growing list of pieces.

use medi_core::messages::{Message, Role};
use serde::Serialize;

/// What a transcript mutation did, for subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TranscriptUpdate {
    /// A message was appended at `index`.
    MessageAppended {
        /// Position of the new message.
        index: usize,
        /// The appended message.
        message: Message,
    },
    /// The message at `index` now has `content`.
    LastMessageUpdated {
        /// Position of the rewritten message.
        index: usize,
        /// Full cumulative content.
        content: String,
    },
    /// The transcript was cleared.
    Cleared,
}

/// Ordered message list plus the open assistant buffer.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    assistant: String,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Cumulative text of the current assistant turn.
    pub fn open_reply(&self) -> &str {
        &self.assistant
    }

    /// Append a user message, closing any open assistant turn.
    pub fn push_user(&mut self, content: impl Into<String>) -> TranscriptUpdate {
        self.close_turn();
        let message = Message::user(content);
        self.messages.push(message.clone());
        TranscriptUpdate::MessageAppended {
            index: self.messages.len() - 1,
            message,
        }
    }

    /// Add `fragment` to the running assistant text.
    pub fn apply_fragment(&mut self, fragment: &str) -> TranscriptUpdate {
        self.assistant.push_str(fragment);
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content.clone_from(&self.assistant);
                TranscriptUpdate::LastMessageUpdated {
                    index: self.messages.len() - 1,
                    content: self.assistant.clone(),
                }
            }
            _ => {
                let message = Message::assistant(self.assistant.clone());
                self.messages.push(message.clone());
                TranscriptUpdate::MessageAppended {
                    index: self.messages.len() - 1,
                    message,
                }
            }
        }
    }

    /// End the assistant turn. The last accumulated content stays as is.
    ///
    /// Returns the final reply text.
    pub fn close_turn(&mut self) -> String {
        std::mem::take(&mut self.assistant)
    }

    /// Drop every message.
    pub fn clear(&mut self) -> TranscriptUpdate {
        self.messages.clear();
        self.assistant.clear();
        TranscriptUpdate::Cleared
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_fragment_appends_then_rewrites_last() {
        let mut transcript = Transcript::new();
        let _ = transcript.push_user("I have a headache and fever for 2 days");

        let first = transcript.apply_fragment("Based on ");
        assert_eq!(
            first,
            TranscriptUpdate::MessageAppended {
                index: 1,
                message: Message::assistant("Based on "),
            }
        );
        let second = transcript.apply_fragment("your symptoms");
        assert_eq!(
            second,
            TranscriptUpdate::LastMessageUpdated {
                index: 1,
                content: "Based on your symptoms".into(),
            }
        );
        let _ = transcript.apply_fragment(", I recommend...");

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.messages()[1].content,
            "Based on your symptoms, I recommend..."
        );
    }

    #[test]
    fn close_turn_keeps_content() {
        let mut transcript = Transcript::new();
        let _ = transcript.push_user("hi");
        let _ = transcript.apply_fragment("Hello");
        assert_eq!(transcript.close_turn(), "Hello");
        assert_eq!(transcript.messages()[1].content, "Hello");
        assert_eq!(transcript.open_reply(), "");
    }

    #[test]
    fn push_user_closes_open_turn() {
        let mut transcript = Transcript::new();
        let _ = transcript.push_user("one");
        let _ = transcript.apply_fragment("reply one");
        let _ = transcript.push_user("two");
        let _ = transcript.apply_fragment("reply two");
        let contents: Vec<_> = transcript.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "reply one", "two", "reply two"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut transcript = Transcript::new();
        let _ = transcript.push_user("one");
        let _ = transcript.apply_fragment("partial");
        assert_eq!(transcript.clear(), TranscriptUpdate::Cleared);
        assert!(transcript.is_empty());
        assert_eq!(transcript.open_reply(), "");
    }

    proptest! {
        #[test]
        fn assistant_content_is_exact_concatenation(fragments in proptest::collection::vec(".{0,12}", 1..20)) {
            let mut transcript = Transcript::new();
            let _ = transcript.push_user("question");
            for fragment in &fragments {
                let _ = transcript.apply_fragment(fragment);
            }
            let expected: String = fragments.concat();
            prop_assert_eq!(transcript.len(), 2);
            prop_assert_eq!(&transcript.messages()[1].content, &expected);
            prop_assert_eq!(transcript.messages()[1].role, Role::Assistant);
        }
    }
}
