//! # medi-core
//!
//! Foundation types shared by every MediAssist crate:
//!
//! - **Branded IDs**: `ConversationId`, `AccountId`, `LoginRecordId` as newtypes
//! - **Messages**: `Message` with `User` / `Assistant` roles, plus the wire shape
//! - **Conversations**: `Conversation`, `ConversationSummary`, `Identity`
//! - **Login activity**: `LoginRecord` and its `DeviceKind`
//! - **Text**: UTF-8 safe truncation for previews and titles
//! - **Logging**: `tracing` subscriber setup and a capture layer for tests

#![deny(unsafe_code)]

pub mod conversation;
pub mod ids;
pub mod logging;
pub mod login;
pub mod messages;
pub mod text;

pub use conversation::{Conversation, ConversationSummary, Identity};
pub use ids::{AccountId, ConversationId, LoginRecordId};
pub use login::{DeviceKind, LoginRecord};
pub use messages::{Message, Role, WireMessage, WireRole};
