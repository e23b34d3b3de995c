//! Auth error types.

use std::fmt;

use serde_json::Value;

/// Why a token refresh did not produce a new access token.
///
/// Cloneable so every caller waiting on the same in-flight refresh receives
/// the same outcome.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No refresh token was stored.
    #[error("no refresh token stored")]
    NoRefreshToken,

    /// The backend answered the refresh call with a non-2xx status.
    #[error("refresh rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        message: String,
    },

    /// The refresh response did not carry a usable access token.
    #[error("malformed refresh response: {0}")]
    Malformed(String),

    /// The refresh call failed before a response arrived.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh call exceeded its time budget.
    #[error("refresh timed out after {0} ms")]
    Timeout(u64),

    /// The stored session was cleared or replaced while the refresh call was
    /// in flight, so the new token was discarded.
    #[error("session changed during refresh")]
    SessionChanged,

    /// The new token could not be persisted.
    #[error("failed to persist refreshed token: {0}")]
    Storage(String),
}

/// An error decoded from a non-2xx backend response.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedError {
    /// Human-readable message.
    pub message: String,
    /// HTTP status of the response.
    pub http_status: Option<u16>,
    /// Parsed JSON body, when the body was JSON.
    pub raw: Option<Value>,
}

impl fmt::Display for DecodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors that can occur during authentication and authenticated requests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No connection could be made (connection refused, DNS).
    #[error("cannot reach server: {0}")]
    NetworkUnreachable(String),

    /// The server accepted the connection but did not answer in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Refresh attempted with no stored refresh token. Credentials were cleared.
    #[error("no refresh token available, please sign in again")]
    NoRefreshToken,

    /// The backend rejected the refresh. Credentials were cleared.
    #[error("token refresh failed: {0}")]
    RefreshFailed(RefreshError),

    /// A 401 could not be resolved by refreshing.
    #[error("session expired, please sign in again ({0})")]
    SessionExpired(RefreshError),

    /// Non-2xx response other than a validation failure.
    #[error("{0}")]
    Server(DecodedError),

    /// 400 or 422 response.
    #[error("{0}")]
    Validation(DecodedError),

    /// A success response's body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Tokens handed to the credential store were empty or unusable.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// HTTP client error that is not a connectivity failure.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Credential file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::NetworkUnreachable(err.to_string())
        } else if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NoRefreshToken => Self::NoRefreshToken,
            other => Self::RefreshFailed(other),
        }
    }
}

impl AuthError {
    /// The decoded backend error, for `Server` and `Validation`.
    pub fn decoded(&self) -> Option<&DecodedError> {
        match self {
            Self::Server(d) | Self::Validation(d) => Some(d),
            _ => None,
        }
    }

    /// Whether the caller must send the user back through sign-in.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::NoRefreshToken | Self::RefreshFailed(_) | Self::SessionExpired(_)
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
