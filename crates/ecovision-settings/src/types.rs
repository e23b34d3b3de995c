//! Settings type definitions.
//!
//! Every section implements [`Default`] with the production values and is
//! marked `#[serde(default)]`, so a partial `settings.json` only has to name
//! the fields it changes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend origin used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Root settings type for the EcoVision client.
///
/// ```json
/// {
///   "api": { "baseUrl": "https://eco.example.com" },
///   "auth": { "refreshTimeoutMs": 5000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EcoVisionSettings {
    /// Backend connection settings.
    pub api: ApiSettings,
    /// Token lifecycle settings.
    pub auth: AuthSettings,
}

/// Backend connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Backend origin, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout for resource calls.
    pub request_timeout_ms: u64,
    /// Liveness check path.
    pub health_path: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            health_path: "/health/".to_string(),
        }
    }
}

impl ApiSettings {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Base URL with any trailing slashes removed.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Token lifecycle settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Login endpoint path.
    pub login_path: String,
    /// Registration endpoint path.
    pub register_path: String,
    /// Token refresh endpoint path.
    pub refresh_path: String,
    /// Upper bound on a single refresh call. Queued retries wait at most this long.
    pub refresh_timeout_ms: u64,
    /// How far ahead of `exp` a token counts as expiring.
    pub expiry_horizon_secs: i64,
    /// Credential file location. `None` means `~/.ecovision/auth.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_path: "/auth/login/".to_string(),
            register_path: "/auth/register/".to_string(),
            refresh_path: "/auth/token/refresh/".to_string(),
            refresh_timeout_ms: 10_000,
            expiry_horizon_secs: 300,
            credentials_path: None,
        }
    }
}

impl AuthSettings {
    /// Refresh timeout as a [`Duration`].
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Resolved credential file path.
    pub fn credentials_file(&self) -> PathBuf {
        match &self.credentials_path {
            Some(p) => PathBuf::from(p),
            None => crate::loader::data_dir().join("auth.json"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
