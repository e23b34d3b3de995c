//! # ecovision-settings
//!
//! Configuration for the EcoVision client, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`EcoVisionSettings::default()`]
//! 2. **User file**: `~/.ecovision/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ECOVISION_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{data_dir, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<EcoVisionSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loads on first call; falls back to compiled defaults (plus env overrides)
/// if the settings file cannot be read.
pub fn get_settings() -> &'static EcoVisionSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!("failed to load settings, using defaults: {e}");
            let mut settings = EcoVisionSettings::default();
            loader::apply_env_overrides(&mut settings);
            settings
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: EcoVisionSettings) -> std::result::Result<(), EcoVisionSettings> {
    SETTINGS.set(settings)
}
