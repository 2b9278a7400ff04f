//! Persistence provider settings.

use serde::{Deserialize, Serialize};

use super::data_dir;

/// Backing stores for authenticated and anonymous history.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// `SQLite` file used as the structured store when no remote is configured.
    pub database_path: String,
    /// JSON file backing the anonymous key-value slot.
    pub local_store_path: String,
    /// Hosted structured store. When set it replaces the `SQLite` file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteStoreSettings>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            database_path: dir.join("history.db").to_string_lossy().into_owned(),
            local_store_path: dir.join("local-storage.json").to_string_lossy().into_owned(),
            remote: None,
        }
    }
}

/// PostgREST-compatible hosted store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteStoreSettings {
    /// Project URL; requests go to `{base_url}/rest/v1/{collection}`.
    pub base_url: String,
    /// Name of the environment variable holding the project API key.
    pub api_key_env: String,
    /// Name of the environment variable holding the signed-in user's access token.
    pub access_token_env: String,
}

impl Default for RemoteStoreSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: "MEDI_REMOTE_API_KEY".to_string(),
            access_token_env: "MEDI_REMOTE_ACCESS_TOKEN".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_live_in_data_dir() {
        let storage = StorageSettings::default();
        assert!(storage.database_path.ends_with("history.db"));
        assert!(storage.local_store_path.ends_with("local-storage.json"));
    }

    #[test]
    fn remote_section_parses() {
        let storage: StorageSettings =
            serde_json::from_str(r#"{"remote": {"baseUrl": "https://example.supabase.co"}}"#)
                .unwrap();
        let remote = storage.remote.unwrap();
        assert_eq!(remote.base_url, "https://example.supabase.co");
        assert_eq!(remote.api_key_env, "MEDI_REMOTE_API_KEY");
    }
}
