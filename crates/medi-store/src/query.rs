//! Generic row queries over the structured store.
//!
//! Rows are JSON objects. Queries are deliberately narrow: equality
//! filters, at most one ordering column, an optional limit.

use serde_json::Value;

use crate::errors::{Result, StoreError};

/// A stored record.
pub type Row = serde_json::Map<String, Value>;

/// Named record collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Conversation headers owned by an account.
    Conversations,
    /// Messages belonging to a conversation.
    Messages,
    /// Sign-in events.
    LoginHistory,
}

impl Collection {
    /// Table (or REST resource) name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Conversations => "chat_conversations",
            Self::Messages => "chat_messages",
            Self::LoginHistory => "login_history",
        }
    }

    /// Columns a row may carry.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Conversations => &["id", "user_id", "title", "created_at", "updated_at"],
            Self::Messages => &["id", "conversation_id", "role", "content", "created_at"],
            Self::LoginHistory => &["id", "user_id", "login_at", "ip_address", "user_agent"],
        }
    }

    /// Fail with [`StoreError::InvalidQuery`] unless `column` belongs here.
    pub fn check_column(self, column: &str) -> Result<()> {
        if self.columns().contains(&column) {
            Ok(())
        } else {
            Err(StoreError::InvalidQuery(format!(
                "unknown column {column} for {}",
                self.table()
            )))
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// `column = value`.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Value to compare with.
    pub value: Value,
}

impl Filter {
    /// Equality filter.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Ordering column and direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    /// Column name.
    pub column: String,
    /// Largest first when `true`.
    pub descending: bool,
}

/// A select over one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Collection to read.
    pub collection: Collection,
    /// All must match.
    pub filters: Vec<Filter>,
    /// Result ordering. Provider order when `None`.
    pub order: Option<Order>,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

impl Query {
    /// Select everything in `collection`.
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    /// Order by `column`, largest first.
    #[must_use]
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: true,
        });
        self
    }

    /// Order by `column`, smallest first.
    #[must_use]
    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: false,
        });
        self
    }

    /// Cap the number of rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check every named column against the collection.
    pub fn validate(&self) -> Result<()> {
        for filter in &self.filters {
            self.collection.check_column(&filter.column)?;
        }
        if let Some(order) = &self.order {
            self.collection.check_column(&order.column)?;
        }
        Ok(())
    }
}

// ── Row accessors ───────────────────────────────────────────────────────────

/// String field, if present and a string.
pub fn get_str<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// String field, or [`StoreError::InvalidRow`].
pub fn require_str<'a>(row: &'a Row, key: &str) -> Result<&'a str> {
    get_str(row, key).ok_or_else(|| StoreError::InvalidRow(format!("missing string field {key}")))
}

/// Record identifier. Hosted stores may return numeric keys.
pub fn require_id(row: &Row) -> Result<String> {
    match row.get("id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::InvalidRow("missing id".into())),
    }
}

/// RFC 3339 timestamp field.
pub fn require_timestamp(row: &Row, key: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let raw = require_str(row, key)?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::InvalidRow(format!("bad timestamp in {key}: {e}")))
}

/// Current time in the format every provider stores.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_clauses() {
        let query = Query::new(Collection::Messages)
            .eq("conversation_id", "c1")
            .order_desc("created_at")
            .limit(3);
        assert_eq!(query.filters, vec![Filter::eq("conversation_id", "c1")]);
        assert!(query.order.as_ref().unwrap().descending);
        assert_eq!(query.limit, Some(3));
        assert!(query.validate().is_ok());
    }

    #[test]
    fn unknown_column_rejected() {
        let query = Query::new(Collection::Conversations).eq("password", "x");
        assert!(matches!(query.validate(), Err(StoreError::InvalidQuery(_))));
        let query = Query::new(Collection::Conversations).order_asc("nope");
        assert!(query.validate().is_err());
    }

    #[test]
    fn table_names() {
        assert_eq!(Collection::Conversations.table(), "chat_conversations");
        assert_eq!(Collection::Messages.to_string(), "chat_messages");
        assert_eq!(Collection::LoginHistory.table(), "login_history");
    }

    #[test]
    fn id_accepts_string_or_number() {
        let row = json!({"id": "abc"}).as_object().unwrap().clone();
        assert_eq!(require_id(&row).unwrap(), "abc");
        let row = json!({"id": 42}).as_object().unwrap().clone();
        assert_eq!(require_id(&row).unwrap(), "42");
        assert!(require_id(&Row::new()).is_err());
    }

    #[test]
    fn timestamps_round_trip_through_rows() {
        let now = timestamp_now();
        let row = json!({"created_at": now}).as_object().unwrap().clone();
        assert!(require_timestamp(&row, "created_at").is_ok());

        let row = json!({"created_at": "2025-01-05T10:00:00.123456+00:00"})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(
            require_timestamp(&row, "created_at").unwrap().to_rfc3339(),
            "2025-01-05T10:00:00.123456+00:00"
        );
    }
}
