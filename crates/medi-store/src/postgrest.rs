//! Hosted structured store speaking the PostgREST dialect.
//!
//! - `GET    /rest/v1/{table}?select=*&col=eq.val&order=col.desc&limit=n`
//! - `POST   /rest/v1/{table}` with `Prefer: return=representation`
//! - `PATCH` / `DELETE` with the same filters, also returning representation
//!   so affected rows can be counted
//!
//! Every request carries the project key as `apikey` and a bearer token
//! (the signed-in user's access token when present, else the project key).

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::errors::{Result, StoreError};
use crate::provider::StructuredStore;
use crate::query::{Collection, Filter, Query, Row};

/// Connection details for a hosted project.
#[derive(Clone, Debug)]
pub struct PostgrestConfig {
    /// Project URL, without the `/rest/v1` suffix.
    pub base_url: String,
    /// Project (anon) key.
    pub api_key: String,
    /// Signed-in user's access token.
    pub access_token: Option<String>,
}

/// reqwest-backed [`StructuredStore`].
pub struct PostgrestStore {
    rest_url: String,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl PostgrestStore {
    /// Create a store with its own HTTP client.
    pub fn new(config: &PostgrestConfig) -> Result<Self> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a store with a shared HTTP client.
    pub fn with_client(config: &PostgrestConfig, client: reqwest::Client) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("apikey", header_value(&config.api_key)?);
        let token = config.access_token.as_deref().unwrap_or(&config.api_key);
        let _ = headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        Ok(Self {
            rest_url: format!("{}/rest/v1", config.base_url.trim_end_matches('/')),
            headers,
            client,
        })
    }

    fn request(&self, method: Method, collection: Collection) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, collection.table()))
            .headers(self.headers.clone())
    }

    async fn rows(&self, request: RequestBuilder, collection: Collection) -> Result<Vec<Row>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = parse_error_message(&body, status.as_u16());
            error!(status = status.as_u16(), table = %collection, message = %message, "store request failed");
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Value> = serde_json::from_str(&body)?;
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::InvalidRow(format!("expected object, got {other}"))),
            })
            .collect()
    }
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|e| StoreError::InvalidQuery(format!("invalid header value: {e}")))
}

/// Render a filter value the way PostgREST expects after `eq.`.
fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn filter_params(collection: Collection, filters: &[Filter]) -> Result<Vec<(String, String)>> {
    filters
        .iter()
        .map(|f| {
            collection.check_column(&f.column)?;
            Ok((f.column.clone(), format!("eq.{}", filter_value(&f.value))))
        })
        .collect()
}

fn require_filters(collection: Collection, filters: &[Filter]) -> Result<()> {
    if filters.is_empty() {
        Err(StoreError::InvalidQuery(format!(
            "refusing unfiltered write to {collection}"
        )))
    } else {
        Ok(())
    }
}

fn parse_error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json["message"]
                .as_str()
                .or_else(|| json["error"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| format!("HTTP {status}: {}", medi_core::text::truncate_str(body, 200)))
}

#[async_trait]
impl StructuredStore for PostgrestStore {
    #[instrument(skip_all, fields(table = %collection))]
    async fn insert(&self, collection: Collection, row: Row) -> Result<Row> {
        for column in row.keys() {
            collection.check_column(column)?;
        }
        let request = self
            .request(Method::POST, collection)
            .header("Prefer", "return=representation")
            .json(&row);
        self.rows(request, collection)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidRow(format!("{collection} insert returned no row")))
    }

    #[instrument(skip_all, fields(table = %query.collection))]
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        query.validate()?;
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(query.collection, &query.filters)?);
        if let Some(order) = &query.order {
            let direction = if order.descending { "desc" } else { "asc" };
            params.push(("order".into(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        debug!(params = ?params, "selecting rows");
        let request = self.request(Method::GET, query.collection).query(&params);
        self.rows(request, query.collection).await
    }

    #[instrument(skip_all, fields(table = %collection))]
    async fn update(&self, collection: Collection, filters: &[Filter], patch: Row) -> Result<usize> {
        require_filters(collection, filters)?;
        for column in patch.keys() {
            collection.check_column(column)?;
        }
        let request = self
            .request(Method::PATCH, collection)
            .query(&filter_params(collection, filters)?)
            .header("Prefer", "return=representation")
            .json(&patch);
        Ok(self.rows(request, collection).await?.len())
    }

    #[instrument(skip_all, fields(table = %collection))]
    async fn delete(&self, collection: Collection, filters: &[Filter]) -> Result<usize> {
        require_filters(collection, filters)?;
        let request = self
            .request(Method::DELETE, collection)
            .query(&filter_params(collection, filters)?)
            .header("Prefer", "return=representation");
        Ok(self.rows(request, collection).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_values_render_plainly() {
        assert_eq!(filter_value(&Value::from("abc")), "abc");
        assert_eq!(filter_value(&Value::from(3)), "3");
        assert_eq!(filter_value(&Value::Null), "null");
    }

    #[test]
    fn filter_params_use_eq_operator() {
        let params = filter_params(
            Collection::Messages,
            &[Filter::eq("conversation_id", "c-1")],
        )
        .unwrap();
        assert_eq!(params, vec![("conversation_id".to_string(), "eq.c-1".to_string())]);
    }

    #[test]
    fn error_message_prefers_message_field() {
        let body = r#"{"code":"PGRST301","message":"JWT expired"}"#;
        assert_eq!(parse_error_message(body, 401), "JWT expired");
        assert_eq!(parse_error_message("oops", 500), "HTTP 500: oops");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let store = PostgrestStore::new(&PostgrestConfig {
            base_url: "https://proj.example.co/".into(),
            api_key: "anon".into(),
            access_token: None,
        })
        .unwrap();
        assert_eq!(store.rest_url, "https://proj.example.co/rest/v1");
    }
}
