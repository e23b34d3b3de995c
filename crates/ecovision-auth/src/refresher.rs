//! Access-token refresh.
//!
//! [`TokenRefresher::refresh`] is single-flight: while one refresh call is
//! in progress, every other caller awaits that same call and observes the
//! same outcome. A failed refresh is terminal for the session: credentials
//! are cleared and the registered session listener is notified once.
//!
//! The new token is written only if the refresh token that was sent is still
//! stored, so a logout or a new login during the call is never overwritten.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use parking_lot::{Mutex, RwLock};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::RefreshError;
use crate::store::CredentialStore;

/// Default upper bound on one refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked when the session can no longer be refreshed.
pub type SessionListener = Arc<dyn Fn(&RefreshError) + Send + Sync>;

type RefreshFuture = BoxFuture<'static, Result<String, RefreshError>>;

/// Refresh endpoint response. `access` is required.
#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: String,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

/// Exchanges the stored refresh token for a new access token.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    timeout: Duration,
    store: Arc<CredentialStore>,
    /// Weak so that an abandoned refresh future, which owns an `Arc<Inner>`,
    /// is dropped with its last waiter.
    in_flight: Mutex<Option<WeakShared<RefreshFuture>>>,
    listener: RwLock<Option<SessionListener>>,
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("refresh_url", &self.inner.refresh_url)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl TokenRefresher {
    /// Refresher posting to `refresh_url`.
    pub fn new(
        http: reqwest::Client,
        refresh_url: impl Into<String>,
        store: Arc<CredentialStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: refresh_url.into(),
                timeout,
                store,
                in_flight: Mutex::new(None),
                listener: RwLock::new(None),
            }),
        }
    }

    /// Register the callback fired when the session must be re-established.
    ///
    /// Replaces any previously registered listener.
    pub fn on_session_expired<F>(&self, listener: F)
    where
        F: Fn(&RefreshError) + Send + Sync + 'static,
    {
        *self.inner.listener.write() = Some(Arc::new(listener));
    }

    /// The store this refresher reads from and writes to.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Whether a refresh call is currently in progress.
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .as_ref()
            .is_some_and(|w| w.upgrade().is_some())
    }

    /// Obtain a new access token, joining a refresh already in progress.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let refresh = {
            let mut slot = self.inner.in_flight.lock();
            if let Some(existing) = slot.as_ref().and_then(WeakShared::upgrade) {
                debug!("joining in-flight token refresh");
                existing
            } else {
                let fut = Inner::start(Arc::clone(&self.inner)).boxed().shared();
                *slot = fut.downgrade();
                fut
            }
        };
        refresh.await
    }
}

impl Inner {
    async fn start(inner: Arc<Self>) -> Result<String, RefreshError> {
        let result = inner.run().await;
        *inner.in_flight.lock() = None;
        match &result {
            Ok(_) | Err(RefreshError::SessionChanged) => {}
            Err(e) => inner.notify_expired(e),
        }
        result
    }

    #[tracing::instrument(skip_all, fields(url = %self.refresh_url))]
    async fn run(&self) -> Result<String, RefreshError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            warn!("refresh requested without a stored refresh token");
            self.evict();
            return Err(RefreshError::NoRefreshToken);
        };

        let outcome = match tokio::time::timeout(self.timeout, self.request(&refresh_token)).await
        {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        let persisted = outcome.and_then(|resp| self.persist(&refresh_token, resp));
        match persisted {
            Ok(access) => {
                info!("access token refreshed");
                Ok(access)
            }
            Err(RefreshError::SessionChanged) => {
                info!("session changed during refresh, discarding new token");
                Err(RefreshError::SessionChanged)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing credentials");
                self.evict();
                Err(e)
            }
        }
    }

    async fn request(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
        let resp = self
            .http
            .post(&self.refresh_url)
            .header(ACCEPT, "application/json")
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        let data: RefreshResponse =
            serde_json::from_slice(&body).map_err(|e| RefreshError::Malformed(e.to_string()))?;
        if data.access.trim().is_empty() {
            return Err(RefreshError::Malformed("empty access token".to_string()));
        }
        Ok(data)
    }

    /// Write the new token only if `sent_refresh` is still the stored one.
    fn persist(&self, sent_refresh: &str, resp: RefreshResponse) -> Result<String, RefreshError> {
        let rotated = resp.refresh.as_deref().filter(|r| !r.trim().is_empty());
        let written = self
            .store
            .replace_if_refresh(sent_refresh, &resp.access, rotated)
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        if !written {
            return Err(RefreshError::SessionChanged);
        }
        Ok(resp.access)
    }

    fn evict(&self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear credentials: {e}");
        }
    }

    fn notify_expired(&self, err: &RefreshError) {
        let listener = self.listener.read().clone();
        match listener {
            Some(listener) => listener(err),
            None => warn!(error = %err, "session expired and no listener is registered"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
