//! # medi-settings
//!
//! Configuration for MediAssist, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MediSettings::default()`]
//! 2. **User file**: `~/.mediassist/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `MEDI_*` overrides (highest priority)
//!
//! Secrets are never stored in the file. Settings only name the environment
//! variables that hold them (see [`EndpointSettings::api_key_env`]).

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_dir, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<MediSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loads from the default path on first call; falls back to compiled
/// defaults if loading fails.
pub fn get_settings() -> &'static MediSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: MediSettings) -> std::result::Result<(), MediSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
