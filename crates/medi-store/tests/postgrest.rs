//! PostgREST provider against a mock HTTP server.

use medi_store::{Collection, Filter, PostgrestConfig, PostgrestStore, Query, StoreError, StructuredStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer, token: Option<&str>) -> PostgrestStore {
    PostgrestStore::new(&PostgrestConfig {
        base_url: server.uri(),
        api_key: "anon-key".into(),
        access_token: token.map(String::from),
    })
    .unwrap()
}

fn row(value: serde_json::Value) -> medi_store::Row {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn select_encodes_filters_order_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_messages"))
        .and(query_param("select", "*"))
        .and(query_param("conversation_id", "eq.c-1"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "3"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "m2", "conversation_id": "c-1", "role": "assistant", "content": "Rest.", "created_at": "2025-01-01T00:00:02Z"},
            {"id": "m1", "conversation_id": "c-1", "role": "user", "content": "Headache", "created_at": "2025-01-01T00:00:01Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = store(&server, Some("user-token"))
        .select(
            &Query::new(Collection::Messages)
                .eq("conversation_id", "c-1")
                .order_desc("created_at")
                .limit(3),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["content"], "Headache");
}

#[tokio::test]
async fn insert_posts_row_and_returns_representation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_conversations"))
        .and(header("prefer", "return=representation"))
        .and(header("authorization", "Bearer anon-key"))
        .and(body_json(json!({"user_id": "acct-1", "title": "Fever"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 17, "user_id": "acct-1", "title": "Fever"}
        ])))
        .mount(&server)
        .await;

    let inserted = store(&server, None)
        .insert(
            Collection::Conversations,
            row(json!({"user_id": "acct-1", "title": "Fever"})),
        )
        .await
        .unwrap();
    assert_eq!(medi_store::query::require_id(&inserted).unwrap(), "17");
}

#[tokio::test]
async fn delete_counts_returned_rows() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/chat_conversations"))
        .and(query_param("id", "eq.c-1"))
        .and(query_param("user_id", "eq.acct-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "c-1"}])))
        .mount(&server)
        .await;

    let removed = store(&server, None)
        .delete(
            Collection::Conversations,
            &[Filter::eq("id", "c-1"), Filter::eq("user_id", "acct-1")],
        )
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn error_status_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/chat_conversations"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"code": "PGRST301", "message": "JWT expired"})),
        )
        .mount(&server)
        .await;

    let err = store(&server, Some("stale"))
        .update(
            Collection::Conversations,
            &[Filter::eq("id", "c-1")],
            row(json!({"updated_at": "2025-01-01T00:00:00Z"})),
        )
        .await
        .unwrap_err();
    match err {
        StoreError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "JWT expired");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_column_rejected_before_request() {
    let server = MockServer::start().await;
    let err = store(&server, None)
        .select(&Query::new(Collection::Messages).eq("secret", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidQuery(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
