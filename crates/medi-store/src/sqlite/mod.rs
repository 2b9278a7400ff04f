//! Embedded `SQLite` implementation of [`StructuredStore`].
//!
//! Each collection maps to one table (see [`Collection::table`]). Column
//! names are checked against [`Collection::columns`] before any SQL is built,
//! so only values are ever bound as parameters. Inserts without an `id` get
//! a UUID v7. All statements run on the blocking thread pool.

pub mod connection;
pub mod migrations;

use std::fmt::Write as _;
use std::path::Path;

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, StoreError};
use crate::provider::StructuredStore;
use crate::query::{Collection, Filter, Query, Row};

use self::connection::{ConnectionConfig, ConnectionPool};

/// `SQLite`-backed structured store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let pool = connection::new_file(&path.to_string_lossy(), &ConnectionConfig::default())?;
        Self::from_pool(pool)
    }

    /// Fresh in-memory database with migrations applied.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(connection::new_in_memory()?)
    }

    fn from_pool(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let applied = migrations::run_migrations(&conn)?;
        debug!(applied, "history database ready");
        drop(conn);
        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl StructuredStore for SqliteStore {
    async fn insert(&self, collection: Collection, row: Row) -> Result<Row> {
        self.with_conn(move |conn| insert_row(conn, collection, row)).await
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let query = query.clone();
        self.with_conn(move |conn| select_rows(conn, &query)).await
    }

    async fn update(&self, collection: Collection, filters: &[Filter], patch: Row) -> Result<usize> {
        let filters = filters.to_vec();
        self.with_conn(move |conn| update_rows(conn, collection, &filters, &patch))
            .await
    }

    async fn delete(&self, collection: Collection, filters: &[Filter]) -> Result<usize> {
        let filters = filters.to_vec();
        self.with_conn(move |conn| delete_rows(conn, collection, &filters))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQL
// ─────────────────────────────────────────────────────────────────────────────

fn insert_row(conn: &Connection, collection: Collection, mut row: Row) -> Result<Row> {
    if !row.contains_key("id") {
        let _ = row.insert("id".into(), Value::String(uuid::Uuid::now_v7().to_string()));
    }
    let id = crate::query::require_id(&row)?;

    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (column, value) in &row {
        collection.check_column(column)?;
        columns.push(column.as_str());
        values.push(json_to_sql(value));
    }
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        collection.table(),
        columns.join(", "),
        placeholders.join(", ")
    );
    let _ = conn.execute(&sql, params_from_iter(values.iter()))?;

    let query = Query::new(collection).eq("id", id.clone());
    select_rows(conn, &query)?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(format!("{collection} row {id} after insert")))
}

fn select_rows(conn: &Connection, query: &Query) -> Result<Vec<Row>> {
    query.validate()?;
    let mut sql = format!("SELECT * FROM {}", query.collection.table());
    let values = push_where(&mut sql, &query.filters);

    if let Some(order) = &query.order {
        let direction = if order.descending { "DESC" } else { "ASC" };
        // rowid breaks ties between rows written in the same instant.
        let _ = write!(sql, " ORDER BY {} {direction}, rowid {direction}", order.column);
    }
    if let Some(limit) = query.limit {
        let _ = write!(sql, " LIMIT {limit}");
    }

    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            let mut map = Row::new();
            for (i, name) in names.iter().enumerate() {
                let _ = map.insert(name.clone(), sql_to_json(row.get_ref(i)?));
            }
            Ok(map)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn update_rows(
    conn: &Connection,
    collection: Collection,
    filters: &[Filter],
    patch: &Row,
) -> Result<usize> {
    require_filters(collection, filters)?;
    if patch.is_empty() {
        return Ok(0);
    }

    let mut assignments = Vec::with_capacity(patch.len());
    let mut values = Vec::with_capacity(patch.len() + filters.len());
    for (column, value) in patch {
        collection.check_column(column)?;
        values.push(json_to_sql(value));
        assignments.push(format!("{column} = ?{}", values.len()));
    }

    let mut sql = format!("UPDATE {} SET {}", collection.table(), assignments.join(", "));
    let mut where_sql = String::new();
    let where_values = push_where_from(&mut where_sql, filters, values.len());
    sql.push_str(&where_sql);
    values.extend(where_values);

    Ok(conn.execute(&sql, params_from_iter(values.iter()))?)
}

fn delete_rows(conn: &Connection, collection: Collection, filters: &[Filter]) -> Result<usize> {
    require_filters(collection, filters)?;
    let mut sql = format!("DELETE FROM {}", collection.table());
    let values = push_where(&mut sql, filters);
    Ok(conn.execute(&sql, params_from_iter(values.iter()))?)
}

fn require_filters(collection: Collection, filters: &[Filter]) -> Result<()> {
    if filters.is_empty() {
        return Err(StoreError::InvalidQuery(format!(
            "refusing unfiltered write to {collection}"
        )));
    }
    for filter in filters {
        collection.check_column(&filter.column)?;
    }
    Ok(())
}

fn push_where(sql: &mut String, filters: &[Filter]) -> Vec<SqlValue> {
    push_where_from(sql, filters, 0)
}

/// Append ` WHERE a = ?n AND ...` numbering placeholders after `offset`.
fn push_where_from(sql: &mut String, filters: &[Filter], offset: usize) -> Vec<SqlValue> {
    let mut values = Vec::with_capacity(filters.len());
    for (i, filter) in filters.iter().enumerate() {
        let keyword = if i == 0 { " WHERE" } else { " AND" };
        let _ = write!(sql, "{keyword} {} = ?{}", filter.column, offset + i + 1);
        values.push(json_to_sql(&filter.value));
    }
    values
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| SqlValue::Real(n.as_f64().unwrap_or_default()), SqlValue::Integer),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    async fn conversation(store: &SqliteStore, user: &str, updated_at: &str) -> String {
        let inserted = store
            .insert(
                Collection::Conversations,
                row(json!({
                    "user_id": user,
                    "title": "t",
                    "created_at": "2025-01-01T00:00:00Z",
                    "updated_at": updated_at
                })),
            )
            .await
            .unwrap();
        inserted["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_returns_row() {
        let store = SqliteStore::in_memory().unwrap();
        let inserted = store
            .insert(
                Collection::Conversations,
                row(json!({
                    "user_id": "u1",
                    "created_at": "2025-01-01T00:00:00Z",
                    "updated_at": "2025-01-01T00:00:00Z"
                })),
            )
            .await
            .unwrap();
        let id = inserted["id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(inserted["user_id"], "u1");
        assert_eq!(inserted["title"], Value::Null);
    }

    #[tokio::test]
    async fn insert_rejects_unknown_column() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store
            .insert(Collection::Conversations, row(json!({"user_id": "u", "bogus": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = SqliteStore::in_memory().unwrap();
        let older = conversation(&store, "u1", "2025-01-01T00:00:00Z").await;
        let newer = conversation(&store, "u1", "2025-02-01T00:00:00Z").await;
        let _other = conversation(&store, "u2", "2025-03-01T00:00:00Z").await;

        let rows = store
            .select(
                &Query::new(Collection::Conversations)
                    .eq("user_id", "u1")
                    .order_desc("updated_at"),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![newer.as_str(), older.as_str()]);

        let limited = store
            .select(
                &Query::new(Collection::Conversations)
                    .eq("user_id", "u1")
                    .order_asc("updated_at")
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0]["id"], older.as_str());
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let store = SqliteStore::in_memory().unwrap();
        let conv = conversation(&store, "u1", "2025-01-01T00:00:00Z").await;
        for content in ["first", "second", "third"] {
            let _ = store
                .insert(
                    Collection::Messages,
                    row(json!({
                        "conversation_id": conv,
                        "role": "user",
                        "content": content,
                        "created_at": "2025-01-01T00:00:00Z"
                    })),
                )
                .await
                .unwrap();
        }
        let rows = store
            .select(
                &Query::new(Collection::Messages)
                    .eq("conversation_id", conv.as_str())
                    .order_desc("created_at"),
            )
            .await
            .unwrap();
        let contents: Vec<&str> = rows.iter().map(|r| r["content"].as_str().unwrap()).collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn update_counts_changed_rows() {
        let store = SqliteStore::in_memory().unwrap();
        let conv = conversation(&store, "u1", "2025-01-01T00:00:00Z").await;
        let changed = store
            .update(
                Collection::Conversations,
                &[Filter::eq("id", conv.as_str()), Filter::eq("user_id", "u1")],
                row(json!({"updated_at": "2025-06-01T00:00:00Z"})),
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let wrong_owner = store
            .update(
                Collection::Conversations,
                &[Filter::eq("id", conv.as_str()), Filter::eq("user_id", "u2")],
                row(json!({"title": "stolen"})),
            )
            .await
            .unwrap();
        assert_eq!(wrong_owner, 0);

        let rows = store
            .select(&Query::new(Collection::Conversations).eq("id", conv.as_str()))
            .await
            .unwrap();
        assert_eq!(rows[0]["updated_at"], "2025-06-01T00:00:00Z");
        assert_eq!(rows[0]["title"], "t");
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let store = SqliteStore::in_memory().unwrap();
        let conv = conversation(&store, "u1", "2025-01-01T00:00:00Z").await;
        let _ = store
            .insert(
                Collection::Messages,
                row(json!({
                    "conversation_id": conv,
                    "role": "user",
                    "content": "hi",
                    "created_at": "2025-01-01T00:00:00Z"
                })),
            )
            .await
            .unwrap();

        let removed = store
            .delete(Collection::Conversations, &[Filter::eq("id", conv.as_str())])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let messages = store
            .select(&Query::new(Collection::Messages).eq("conversation_id", conv.as_str()))
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn unfiltered_writes_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.delete(Collection::Conversations, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
        let err = store
            .update(Collection::Messages, &[], row(json!({"content": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn message_for_missing_conversation_fails() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store
            .insert(
                Collection::Messages,
                row(json!({
                    "conversation_id": "nope",
                    "role": "user",
                    "content": "hi",
                    "created_at": "2025-01-01T00:00:00Z"
                })),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[tokio::test]
    async fn open_creates_parent_dirs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let _ = conversation(&store, "u1", "2025-01-01T00:00:00Z").await;
        }
        let store = SqliteStore::open(&path).unwrap();
        let rows = store
            .select(&Query::new(Collection::Conversations))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
