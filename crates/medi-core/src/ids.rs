//! Branded ID newtypes for type safety.
//!
//! Each addressable entity has a distinct ID type wrapping a `String`, so a
//! conversation reference can never be passed where an account ID is expected.
//! The inner value is opaque: remote IDs are whatever the persistence provider
//! assigns, anonymous conversation IDs are millisecond timestamps.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Opaque reference to a conversation, valid for exactly one backing store.
    ConversationId
}

branded_id! {
    /// Identifier of an authenticated account (owner of remote history).
    AccountId
}

branded_id! {
    /// Identifier of a persisted login record.
    LoginRecordId
}

impl ConversationId {
    /// Time-based ID for a conversation kept in the anonymous local store.
    ///
    /// Milliseconds since the Unix epoch, as a decimal string.
    #[must_use]
    pub fn local_now() -> Self {
        Self(chrono::Utc::now().timestamp_millis().to_string())
    }

    /// Provider-style ID (UUID v7, time-ordered).
    #[must_use]
    pub fn generated() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl LoginRecordId {
    /// Provider-style ID (UUID v7, time-ordered).
    #[must_use]
    pub fn generated() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
