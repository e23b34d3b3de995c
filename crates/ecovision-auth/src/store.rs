//! Credential storage.
//!
//! [`CredentialStore`] is the only owner of the persisted access token,
//! refresh token and user profile. It keeps an in-memory copy behind a mutex
//! and writes every mutation through to a [`CredentialBackend`], so the
//! both-tokens-or-neither invariant holds even with concurrent writers.
//!
//! The default backend is a JSON file (`~/.ecovision/auth.json`) written with
//! 0o600 permissions.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AuthError;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the serialized user profile.
pub const USER_INFO_KEY: &str = "user_info";

/// Raw persisted state. Fields may be individually absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// User profile as returned by login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<Value>,
}

impl StoredCredentials {
    fn access(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// A complete credential set. Only produced when both tokens are present.
#[derive(Clone, Debug, PartialEq)]
pub struct Credentials {
    /// Short-lived bearer token.
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens.
    pub refresh_token: String,
    /// Opaque user profile.
    pub user_profile: Option<Value>,
}

/// Durable key-value storage for [`StoredCredentials`].
pub trait CredentialBackend: Send + Sync {
    /// Read the persisted state. A missing store is the empty state.
    fn load(&self) -> Result<StoredCredentials, AuthError>;
    /// Replace the persisted state.
    fn save(&self, state: &StoredCredentials) -> Result<(), AuthError>;
    /// Remove all persisted state. Must be idempotent.
    fn clear(&self) -> Result<(), AuthError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

/// JSON file backend.
#[derive(Clone, Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Backend writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<StoredCredentials, AuthError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredCredentials::default());
            }
            Err(e) => return Err(AuthError::Io(e)),
        };
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, state: &StoredCredentials) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Io(e)),
        }
    }
}

/// In-process backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<StoredCredentials>,
}

impl MemoryBackend {
    /// Backend pre-populated with `state`.
    pub fn with_state(state: StoredCredentials) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<StoredCredentials, AuthError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &StoredCredentials) -> Result<(), AuthError> {
        *self.state.lock() = state.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.state.lock() = StoredCredentials::default();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the client's credentials.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    state: Mutex<StoredCredentials>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Open a store over `backend`, loading what it holds.
    ///
    /// An unreadable backend is treated as logged out.
    pub fn open(backend: impl CredentialBackend + 'static) -> Self {
        let state = backend.load().unwrap_or_else(|e| {
            tracing::warn!("failed to load stored credentials, starting signed out: {e}");
            StoredCredentials::default()
        });
        Self {
            backend: Box::new(backend),
            state: Mutex::new(state),
        }
    }

    /// Open a file-backed store.
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::open(FileBackend::new(path))
    }

    /// Empty in-memory store.
    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::default())
    }

    /// The complete credential set, or `None` when either token is missing.
    pub fn get(&self) -> Option<Credentials> {
        let state = self.state.lock();
        Some(Credentials {
            access_token: state.access()?.to_string(),
            refresh_token: state.refresh()?.to_string(),
            user_profile: state.user_info.clone(),
        })
    }

    /// Stored access token, if non-empty.
    pub fn access_token(&self) -> Option<String> {
        self.state.lock().access().map(str::to_string)
    }

    /// Stored refresh token, if non-empty.
    pub fn refresh_token(&self) -> Option<String> {
        self.state.lock().refresh().map(str::to_string)
    }

    /// Stored user profile.
    pub fn user_profile(&self) -> Option<Value> {
        self.state.lock().user_info.clone()
    }

    /// True iff both tokens are present and non-empty.
    pub fn is_authenticated(&self) -> bool {
        let state = self.state.lock();
        state.access().is_some() && state.refresh().is_some()
    }

    /// Store a fresh credential set. `profile = None` keeps the stored profile.
    pub fn set(
        &self,
        access: &str,
        refresh: &str,
        profile: Option<Value>,
    ) -> Result<(), AuthError> {
        require_token("access", access)?;
        require_token("refresh", refresh)?;
        self.update(|state| {
            state.access_token = Some(access.to_string());
            state.refresh_token = Some(refresh.to_string());
            if let Some(p) = profile {
                state.user_info = Some(p);
            }
        })
    }

    /// Replace only the access token.
    pub fn set_access_only(&self, access: &str) -> Result<(), AuthError> {
        require_token("access", access)?;
        self.update(|state| state.access_token = Some(access.to_string()))
    }

    /// Replace only the refresh token (rotation on refresh).
    pub fn set_refresh(&self, refresh: &str) -> Result<(), AuthError> {
        require_token("refresh", refresh)?;
        self.update(|state| state.refresh_token = Some(refresh.to_string()))
    }

    /// Store a refreshed access token, and a rotated refresh token if given,
    /// only while `expected_refresh` is still the stored refresh token.
    ///
    /// Returns `Ok(false)` without writing when the session was cleared or
    /// replaced after the refresh call was sent.
    pub fn replace_if_refresh(
        &self,
        expected_refresh: &str,
        access: &str,
        rotated: Option<&str>,
    ) -> Result<bool, AuthError> {
        require_token("access", access)?;
        if let Some(r) = rotated {
            require_token("refresh", r)?;
        }
        let mut state = self.state.lock();
        if state.refresh() != Some(expected_refresh) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.access_token = Some(access.to_string());
        if let Some(r) = rotated {
            next.refresh_token = Some(r.to_string());
        }
        self.backend.save(&next)?;
        *state = next;
        Ok(true)
    }

    /// Remove all credentials. Idempotent.
    ///
    /// The in-memory copy is cleared even when the backend fails.
    pub fn clear(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock();
        *state = StoredCredentials::default();
        self.backend.clear()
    }

    fn update(&self, apply: impl FnOnce(&mut StoredCredentials)) -> Result<(), AuthError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        apply(&mut next);
        self.backend.save(&next)?;
        *state = next;
        Ok(())
    }
}

fn require_token(kind: &str, token: &str) -> Result<(), AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::InvalidCredentials(format!(
            "{kind} token must not be empty"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn test_path(dir: &TempDir) -> PathBuf {
        dir.path().join("auth.json")
    }

    #[test]
    fn empty_store_is_unauthenticated() {
        let store = CredentialStore::in_memory();
        assert!(!store.is_authenticated());
        assert!(store.get().is_none());
        assert!(store.access_token().is_none());
    }

    #[test]
    fn set_then_get() {
        let store = CredentialStore::in_memory();
        store
            .set("T1", "R1", Some(serde_json::json!({"name": "A"})))
            .unwrap();
        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "T1");
        assert_eq!(creds.refresh_token, "R1");
        assert_eq!(creds.user_profile.unwrap()["name"], "A");
    }

    #[test]
    fn set_without_profile_keeps_existing_profile() {
        let store = CredentialStore::in_memory();
        store
            .set("T1", "R1", Some(serde_json::json!({"name": "A"})))
            .unwrap();
        store.set("T2", "R2", None).unwrap();
        assert_eq!(store.user_profile().unwrap()["name"], "A");
        assert_eq!(store.access_token().as_deref(), Some("T2"));
    }

    #[test]
    fn set_rejects_empty_tokens() {
        let store = CredentialStore::in_memory();
        assert_matches!(store.set("", "R1", None), Err(AuthError::InvalidCredentials(_)));
        assert_matches!(store.set("T1", " ", None), Err(AuthError::InvalidCredentials(_)));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn set_access_only_keeps_refresh_and_profile() {
        let store = CredentialStore::in_memory();
        store
            .set("T1", "R1", Some(serde_json::json!({"id": 7})))
            .unwrap();
        store.set_access_only("T2").unwrap();
        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "T2");
        assert_eq!(creds.refresh_token, "R1");
        assert_eq!(creds.user_profile.unwrap()["id"], 7);
    }

    #[test]
    fn access_only_without_refresh_is_partial() {
        let store = CredentialStore::in_memory();
        store.set_access_only("T1").unwrap();
        assert!(!store.is_authenticated());
        assert!(store.get().is_none());
        assert_eq!(store.access_token().as_deref(), Some("T1"));
    }

    #[test]
    fn replace_if_refresh_writes_on_match() {
        let store = CredentialStore::in_memory();
        store.set("T1", "R1", None).unwrap();
        assert!(store.replace_if_refresh("R1", "T2", None).unwrap());
        assert_eq!(store.access_token().as_deref(), Some("T2"));
        assert_eq!(store.refresh_token().as_deref(), Some("R1"));

        assert!(store.replace_if_refresh("R1", "T3", Some("R2")).unwrap());
        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "T3");
        assert_eq!(creds.refresh_token, "R2");
    }

    #[test]
    fn replace_if_refresh_skips_cleared_or_replaced_session() {
        let store = CredentialStore::in_memory();
        store.set("T1", "R1", None).unwrap();
        store.clear().unwrap();
        assert!(!store.replace_if_refresh("R1", "T2", None).unwrap());
        assert!(store.access_token().is_none());
        assert!(store.get().is_none());

        store.set("U1", "S1", None).unwrap();
        assert!(!store.replace_if_refresh("R1", "T2", Some("R2")).unwrap());
        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "U1");
        assert_eq!(creds.refresh_token, "S1");
    }

    #[test]
    fn clear_is_idempotent() {
        let store = CredentialStore::in_memory();
        store.set("T1", "R1", None).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert!(store.user_profile().is_none());
    }

    // ── file backend ────────────────────────────────────────────────

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = test_path(&dir);
        {
            let store = CredentialStore::open_file(&path);
            store
                .set("T1", "R1", Some(serde_json::json!({"name": "A"})))
                .unwrap();
        }
        let reopened = CredentialStore::open_file(&path);
        assert_eq!(reopened.access_token().as_deref(), Some("T1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("R1"));
    }

    #[test]
    fn file_uses_storage_keys() {
        let dir = TempDir::new().unwrap();
        let path = test_path(&dir);
        let store = CredentialStore::open_file(&path);
        store
            .set("T1", "R1", Some(serde_json::json!({"name": "A"})))
            .unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[ACCESS_TOKEN_KEY], "T1");
        assert_eq!(raw[REFRESH_TOKEN_KEY], "R1");
        assert_eq!(raw[USER_INFO_KEY]["name"], "A");
    }

    #[test]
    fn file_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = test_path(&dir);
        let store = CredentialStore::open_file(&path);
        store.set("T1", "R1", None).unwrap();
        assert!(path.exists());
        store.clear().unwrap();
        assert!(!path.exists());
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_opens_signed_out() {
        let dir = TempDir::new().unwrap();
        let path = test_path(&dir);
        std::fs::write(&path, "not json").unwrap();
        let store = CredentialStore::open_file(&path);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn file_with_one_token_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let path = test_path(&dir);
        std::fs::write(&path, r#"{"access_token":"T1"}"#).unwrap();
        let store = CredentialStore::open_file(&path);
        assert!(!store.is_authenticated());
        assert!(store.get().is_none());
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("auth.json");
        let store = CredentialStore::open_file(&path);
        store.set("T1", "R1", None).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_permissions_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = test_path(&dir);
        CredentialStore::open_file(&path)
            .set("T1", "R1", None)
            .unwrap();
        let perms = std::fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

    // ── credential invariant ────────────────────────────────────────

    #[derive(Clone, Debug)]
    enum Op {
        Set(String, String),
        SetAccessOnly(String),
        Clear,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let token = prop_oneof![Just(String::new()), "[a-z]{1,4}"];
        prop_oneof![
            (token.clone(), token.clone()).prop_map(|(a, r)| Op::Set(a, r)),
            token.prop_map(Op::SetAccessOnly),
            Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn authenticated_iff_both_tokens_present(ops in proptest::collection::vec(op_strategy(), 0..24)) {
            let store = CredentialStore::in_memory();
            let mut access: Option<String> = None;
            let mut refresh: Option<String> = None;

            for op in ops {
                match op {
                    Op::Set(a, r) => {
                        if store.set(&a, &r, None).is_ok() {
                            access = Some(a);
                            refresh = Some(r);
                        }
                    }
                    Op::SetAccessOnly(a) => {
                        if store.set_access_only(&a).is_ok() {
                            access = Some(a);
                        }
                    }
                    Op::Clear => {
                        store.clear().unwrap();
                        access = None;
                        refresh = None;
                    }
                }
                let expected = access.as_deref().is_some_and(|t| !t.is_empty())
                    && refresh.as_deref().is_some_and(|t| !t.is_empty());
                prop_assert_eq!(store.is_authenticated(), expected);
                prop_assert_eq!(store.get().is_some(), expected);
            }
        }
    }
}
