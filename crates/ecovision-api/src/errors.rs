//! Error types for the resource API.

use ecovision_auth::AuthError;

/// Errors from resource calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The file offered for classification was rejected before upload.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Authentication, transport or backend error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Reading the image from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Whether the user has to sign in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::Auth(e) if e.requires_reauthentication())
    }
}

/// Short message suitable for showing to an end user.
pub fn user_message(err: &ApiError) -> String {
    match err {
        ApiError::InvalidImage(reason) => reason.clone(),
        ApiError::Io(e) => format!("Could not read the file: {e}"),
        ApiError::Auth(auth) => match auth {
            AuthError::NetworkUnreachable(_) => {
                "Cannot reach the server. Make sure the backend is running.".to_string()
            }
            AuthError::Timeout(_) => {
                "The server took too long to respond. Please try again.".to_string()
            }
            AuthError::NoRefreshToken
            | AuthError::RefreshFailed(_)
            | AuthError::SessionExpired(_) => "Your session has expired. Please sign in again.".to_string(),
            AuthError::Server(decoded) | AuthError::Validation(decoded) => decoded.message.clone(),
            AuthError::Decode(_) => "The server sent an unexpected response.".to_string(),
            AuthError::InvalidCredentials(_) => "The server returned unusable credentials.".to_string(),
            AuthError::Http(_) | AuthError::Io(_) | AuthError::Json(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
