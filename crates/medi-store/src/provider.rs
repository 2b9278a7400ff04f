//! Storage provider traits.
//!
//! [`StructuredStore`] is the row store behind authenticated history and
//! login tracking. [`KeyValueStore`] is the single-slot browser-style store
//! behind anonymous history.

use async_trait::async_trait;

use crate::errors::Result;
use crate::query::{Collection, Filter, Query, Row};

/// Row-level store with equality filters.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// Insert `row` and return it as stored, including any assigned `id`.
    async fn insert(&self, collection: Collection, row: Row) -> Result<Row>;

    /// Rows matching `query`.
    async fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Apply `patch` to matching rows; returns how many changed.
    ///
    /// An empty filter list is rejected.
    async fn update(&self, collection: Collection, filters: &[Filter], patch: Row) -> Result<usize>;

    /// Delete matching rows; returns how many were removed.
    ///
    /// An empty filter list is rejected.
    async fn delete(&self, collection: Collection, filters: &[Filter]) -> Result<usize>;
}

/// String-valued key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    async fn set(&self, key: &str, value: String) -> Result<()>;
}
