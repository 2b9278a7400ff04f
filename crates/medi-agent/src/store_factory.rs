//! Builds persistence and transport from settings.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use medi_llm::{HttpChatTransport, HttpTransportConfig};
use medi_settings::{MediSettings, RemoteStoreSettings};
use medi_store::{
    FileKeyValueStore, HistoryLimits, KeyValueStore, PersistenceRouter, PostgrestConfig,
    PostgrestStore, SqliteStore, StructuredStore,
};
use tracing::info;

/// Remote store when configured, otherwise the local `SQLite` file.
pub fn structured_store(settings: &MediSettings) -> Result<Arc<dyn StructuredStore>> {
    if let Some(remote) = &settings.storage.remote {
        let store = PostgrestStore::new(&postgrest_config(remote)?)
            .context("Failed to configure remote store")?;
        info!(url = %remote.base_url, "using remote structured store");
        return Ok(Arc::new(store));
    }
    let path = &settings.storage.database_path;
    let store = SqliteStore::open(path)
        .with_context(|| format!("Failed to open history database: {path}"))?;
    info!(path = %path, "using local history database");
    Ok(Arc::new(store))
}

fn postgrest_config(remote: &RemoteStoreSettings) -> Result<PostgrestConfig> {
    let Some(api_key) = std::env::var(&remote.api_key_env).ok().filter(|k| !k.is_empty()) else {
        bail!(
            "Remote store configured but ${} is not set",
            remote.api_key_env
        );
    };
    Ok(PostgrestConfig {
        base_url: remote.base_url.clone(),
        api_key,
        access_token: std::env::var(&remote.access_token_env)
            .ok()
            .filter(|t| !t.is_empty()),
    })
}

/// Router over the configured stores.
pub fn router(settings: &MediSettings, limits: HistoryLimits) -> Result<PersistenceRouter> {
    let structured = structured_store(settings)?;
    let kv: Arc<dyn KeyValueStore> =
        Arc::new(FileKeyValueStore::new(&settings.storage.local_store_path));
    Ok(PersistenceRouter::new(structured, kv, limits))
}

/// HTTP transport for the configured endpoint.
pub fn transport(settings: &MediSettings) -> Result<HttpChatTransport> {
    let endpoint = &settings.endpoint;
    let mut config = HttpTransportConfig::new(&endpoint.url)
        .with_api_key(endpoint.api_key())
        .with_model(endpoint.model.clone());
    if let Some(prompt) = &endpoint.system_prompt {
        config = config.with_system_prompt(prompt.clone());
    }
    HttpChatTransport::new(config).context("Failed to configure chat transport")
}
