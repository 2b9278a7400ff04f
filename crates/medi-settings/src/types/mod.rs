//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file only overrides the fields it names.

mod endpoint;
mod history;
mod storage;

pub use endpoint::*;
pub use history::*;
pub use storage::*;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directory holding the settings file and default data files
/// (`~/.mediassist`).
pub fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mediassist")
}

/// Root settings type.
///
/// ```json
/// {
///   "endpoint": { "model": "google/gemini-2.5-pro" },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Chat-completion endpoint.
    pub endpoint: EndpointSettings,
    /// Conversation history presentation limits.
    pub history: HistorySettings,
    /// Persistence providers.
    pub storage: StorageSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for MediSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "mediassist".to_string(),
            endpoint: EndpointSettings::default(),
            history: HistorySettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(MediSettings::default()).unwrap();
        assert!(json["endpoint"].get("apiKeyEnv").is_some());
        assert!(json["history"].get("previewLimit").is_some());
        assert!(json["storage"].get("databasePath").is_some());
        assert!(json["storage"].get("remote").is_none());
    }

    #[test]
    fn empty_json_produces_defaults() {
        let settings: MediSettings = serde_json::from_str("{}").unwrap();
        let defaults = MediSettings::default();
        assert_eq!(settings.endpoint.url, defaults.endpoint.url);
        assert_eq!(settings.history.preview_limit, defaults.history.preview_limit);
    }

    #[test]
    fn data_dir_ends_with_app_dir() {
        assert!(data_dir().ends_with(".mediassist"));
    }
}
