//! Client-side JWT expiry checks.
//!
//! Only the payload's `exp` claim is read. The signature is not verified:
//! this decides when to refresh, it is not a trust boundary.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

/// Default look-ahead before `exp` at which a token counts as expiring (5 minutes).
pub const DEFAULT_EXPIRY_HORIZON_SECS: i64 = 300;

/// Decides whether an access token should be refreshed before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenInspector {
    horizon_secs: i64,
}

impl Default for TokenInspector {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_HORIZON_SECS)
    }
}

impl TokenInspector {
    /// Inspector with the given look-ahead.
    pub fn new(horizon_secs: i64) -> Self {
        Self { horizon_secs }
    }

    /// Configured look-ahead in seconds.
    pub fn horizon_secs(&self) -> i64 {
        self.horizon_secs
    }

    /// True when the token is missing, undecodable, or expires within the horizon.
    pub fn is_expiring_soon(&self, token: Option<&str>) -> bool {
        is_expiring_at(token, self.horizon_secs, chrono::Utc::now().timestamp())
    }
}

/// Read the `exp` claim (seconds since epoch) from a JWT.
pub fn expires_at(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    #[allow(clippy::cast_possible_truncation)]
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f.floor() as i64))
}

/// Fail-closed expiry check against an explicit clock.
pub fn is_expiring_at(token: Option<&str>, horizon_secs: i64, now: i64) -> bool {
    match token.filter(|t| !t.is_empty()).and_then(expires_at) {
        Some(exp) => now.saturating_add(horizon_secs) >= exp,
        None => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
