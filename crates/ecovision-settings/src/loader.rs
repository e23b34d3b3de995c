//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EcoVisionSettings::default()`]
//! 2. If `~/.ecovision/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `ECOVISION_*` environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::EcoVisionSettings;

/// Resolve the client data directory (`~/.ecovision`).
pub fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ecovision")
}

/// Resolve the path to the settings file (`~/.ecovision/settings.json`).
pub fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<EcoVisionSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<EcoVisionSettings> {
    let mut settings = load_file_layers(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layers(path: &Path) -> Result<EcoVisionSettings> {
    let defaults = serde_json::to_value(EcoVisionSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply environment variable overrides from the process environment.
pub fn apply_env_overrides(settings: &mut EcoVisionSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using an arbitrary variable lookup.
///
/// Invalid values are ignored with a warning and the file/default value is kept.
pub fn apply_overrides_from<F>(settings: &mut EcoVisionSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let read_u64 = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    };

    if let Some(v) = read_string("ECOVISION_API_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_u64("ECOVISION_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.api.request_timeout_ms = v;
    }
    if let Some(v) = read_u64("ECOVISION_REFRESH_TIMEOUT_MS", 100, 120_000) {
        settings.auth.refresh_timeout_ms = v;
    }
    if let Some(v) = read_u64("ECOVISION_EXPIRY_HORIZON_SECS", 0, 86_400) {
        settings.auth.expiry_horizon_secs = i64::try_from(v).unwrap_or(300);
    }
    if let Some(v) = read_string("ECOVISION_CREDENTIALS_PATH") {
        settings.auth.credentials_path = Some(v);
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
