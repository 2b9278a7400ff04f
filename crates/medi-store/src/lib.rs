//! # medi-store
//!
//! Persistence for MediAssist chat history.
//!
//! - [`StructuredStore`]: rows in collections, with equality filters,
//!   ordering and limits. Backed by SQLite ([`SqliteStore`]) or a hosted
//!   PostgREST project ([`PostgrestStore`]).
//! - [`KeyValueStore`]: string slots for anonymous history
//!   ([`FileKeyValueStore`], [`MemoryKeyValueStore`]).
//! - [`PersistenceRouter`]: picks the backend from the session identity.
//! - [`login_history`]: account sign-in records.

#![deny(unsafe_code)]

pub mod errors;
pub mod kv;
pub mod login_history;
pub mod postgrest;
pub mod provider;
pub mod query;
pub mod router;
pub mod sqlite;

pub use errors::{Result, StoreError};
pub use kv::{FileKeyValueStore, MemoryKeyValueStore};
pub use login_history::{recent_logins, record_login};
pub use postgrest::{PostgrestConfig, PostgrestStore};
pub use provider::{KeyValueStore, StructuredStore};
pub use query::{Collection, Filter, Order, Query, Row};
pub use router::{HistoryBackend, HistoryLimits, PersistenceRouter};
pub use sqlite::SqliteStore;
