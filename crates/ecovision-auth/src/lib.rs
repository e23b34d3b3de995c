//! # ecovision-auth
//!
//! Token lifecycle and authenticated requests for the EcoVision backend.
//!
//! - [`store`]: persisted access/refresh token pair plus user profile
//! - [`inspector`]: JWT `exp` checks against a refresh horizon
//! - [`refresher`]: single-flight token refresh with a session-expired listener
//! - [`request`]: [`AuthClient`], bearer auth with one refresh-and-retry on 401
//! - [`decoder`]: backend error bodies to readable messages
//! - [`session`]: login, register, logout, health
//!
//! Credentials are persisted to `~/.ecovision/auth.json` with owner-only
//! file permissions.

#![deny(unsafe_code)]

pub mod decoder;
pub mod errors;
pub mod inspector;
pub mod refresher;
pub mod request;
pub mod session;
pub mod store;

pub use decoder::ResponseDecoder;
pub use errors::{AuthError, DecodedError, RefreshError};
pub use inspector::{DEFAULT_EXPIRY_HORIZON_SECS, TokenInspector, expires_at, is_expiring_at};
pub use refresher::{DEFAULT_REFRESH_TIMEOUT, SessionListener, TokenRefresher};
pub use request::{ApiRequest, AuthClient, MultipartBody, RequestBody};
pub use session::{LoginResponse, RegisterOutcome};
pub use store::{
    CredentialBackend, CredentialStore, Credentials, FileBackend, MemoryBackend, StoredCredentials,
};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
