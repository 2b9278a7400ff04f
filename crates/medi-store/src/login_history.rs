//! Per-account sign-in activity.

use medi_core::ids::{AccountId, LoginRecordId};
use medi_core::login::LoginRecord;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::Result;
use crate::provider::StructuredStore;
use crate::query::{Collection, Query, Row, get_str, require_id, require_timestamp, timestamp_now};

/// Append a sign-in for `account`.
pub async fn record_login(
    store: &dyn StructuredStore,
    account: &AccountId,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<LoginRecord> {
    let mut row = Map::new();
    let _ = row.insert("user_id".into(), Value::from(account.as_str()));
    let _ = row.insert("login_at".into(), Value::from(timestamp_now()));
    let _ = row.insert("ip_address".into(), ip_address.map_or(Value::Null, Value::from));
    let _ = row.insert("user_agent".into(), user_agent.map_or(Value::Null, Value::from));

    let inserted = store.insert(Collection::LoginHistory, row).await?;
    let record = record_from_row(&inserted)?;
    debug!(account = %account, device = %record.device(), "recorded login");
    Ok(record)
}

/// Up to `limit` sign-ins for `account`, newest first.
pub async fn recent_logins(
    store: &dyn StructuredStore,
    account: &AccountId,
    limit: usize,
) -> Result<Vec<LoginRecord>> {
    let rows = store
        .select(
            &Query::new(Collection::LoginHistory)
                .eq("user_id", account.as_str())
                .order_desc("login_at")
                .limit(limit),
        )
        .await?;
    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &Row) -> Result<LoginRecord> {
    Ok(LoginRecord {
        id: LoginRecordId::from(require_id(row)?),
        user_id: AccountId::from(get_str(row, "user_id").unwrap_or_default()),
        login_at: require_timestamp(row, "login_at")?,
        ip_address: get_str(row, "ip_address").map(String::from),
        user_agent: get_str(row, "user_agent").map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use crate::sqlite::SqliteStore;
    use medi_core::login::DeviceKind;

    #[tokio::test]
    async fn record_and_list_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let account = AccountId::from("acct-1");
        let first = record_login(&store, &account, Some("10.0.0.1"), Some("Mozilla/5.0 (iPhone) Mobile"))
            .await
            .unwrap();
        let second = record_login(&store, &account, None, None).await.unwrap();
        let _ = record_login(&store, &AccountId::from("other"), None, None).await.unwrap();

        assert_eq!(first.device(), DeviceKind::Mobile);
        assert_eq!(first.ip_address.as_deref(), Some("10.0.0.1"));

        let logins = recent_logins(&store, &account, 50).await.unwrap();
        assert_eq!(logins.len(), 2);
        assert_eq!(logins[0].id, second.id);
        assert_eq!(logins[1].id, first.id);
        assert!(logins[1].user_agent.is_some());
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let store = SqliteStore::in_memory().unwrap();
        let account = AccountId::from("acct-1");
        for _ in 0..4 {
            let _ = record_login(&store, &account, None, None).await.unwrap();
        }
        assert_eq!(recent_logins(&store, &account, 2).await.unwrap().len(), 2);

        let removed = store
            .delete(Collection::LoginHistory, &[Filter::eq("user_id", "acct-1")])
            .await
            .unwrap();
        assert_eq!(removed, 4);
    }
}
