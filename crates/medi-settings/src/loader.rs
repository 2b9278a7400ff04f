//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MediSettings::default()`]
//! 2. If `~/.mediassist/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `MEDI_*` environment variable overrides (highest priority)
//! 4. Reject settings that cannot produce a working session
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{MediSettings, data_dir};

/// Directory holding the settings file (`~/.mediassist`).
pub fn settings_dir() -> PathBuf {
    data_dir()
}

/// Resolve the path to the settings file (`~/.mediassist/settings.json`).
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MediSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<MediSettings> {
    let defaults = serde_json::to_value(MediSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MediSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut MediSettings) {
    // ── Endpoint ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEDI_ENDPOINT_URL") {
        settings.endpoint.url = v;
    }
    if let Some(v) = read_env_string("MEDI_MODEL") {
        settings.endpoint.model = Some(v);
    }
    if let Some(v) = read_env_string("MEDI_API_KEY_ENV") {
        settings.endpoint.api_key_env = v;
    }

    // ── History ─────────────────────────────────────────────────────
    if let Some(v) = read_env_usize("MEDI_PREVIEW_LIMIT", 1, 100) {
        settings.history.preview_limit = v;
    }
    if let Some(v) = read_env_usize("MEDI_PREVIEW_CHARS", 1, 10_000) {
        settings.history.preview_chars = v;
    }
    if let Some(v) = read_env_usize("MEDI_TITLE_CHARS", 1, 1_000) {
        settings.history.title_chars = v;
    }
    if let Some(v) = read_env_usize("MEDI_LOGIN_HISTORY_LIMIT", 1, 10_000) {
        settings.history.login_history_limit = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEDI_DATABASE_PATH") {
        settings.storage.database_path = v;
    }
    if let Some(v) = read_env_string("MEDI_LOCAL_STORE_PATH") {
        settings.storage.local_store_path = v;
    }
    if let Some(v) = read_env_string("MEDI_REMOTE_URL") {
        settings.storage.remote.get_or_insert_with(Default::default).base_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEDI_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings that would fail on the first request.
pub fn validate(settings: &MediSettings) -> Result<()> {
    if settings.endpoint.url.trim().is_empty() {
        return Err(SettingsError::InvalidValue("endpoint url is empty".into()));
    }
    if let Some(remote) = &settings.storage.remote {
        if remote.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "storage.remote.baseUrl is empty".into(),
            ));
        }
    }
    if settings.history.preview_limit == 0 {
        return Err(SettingsError::InvalidValue(
            "history.previewLimit must be at least 1".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
