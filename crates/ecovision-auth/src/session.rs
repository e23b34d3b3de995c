//! Session calls: login, register, logout, health and proactive refresh.
//!
//! Login and register go straight to the transport. A 401 there means bad
//! credentials, so it must not enter the refresh-and-retry path.

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::decoder::ResponseDecoder;
use crate::errors::AuthError;
use crate::request::AuthClient;

/// Field order used for register validation messages.
const REGISTER_FIELDS: [&str; 3] = ["username", "email", "password"];

/// Successful login payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Access token.
    #[serde(alias = "access_token")]
    pub access: String,
    /// Refresh token.
    #[serde(alias = "refresh_token")]
    pub refresh: String,
    /// User profile, when the backend includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of [`AuthClient::register`].
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterOutcome {
    /// The register endpoint's response body.
    pub registration: Value,
    /// Login result when the automatic login succeeded.
    pub login: Option<LoginResponse>,
    /// Whether the automatic login succeeded.
    pub auto_login: bool,
    /// Whether the user still has to sign in manually.
    pub login_required: bool,
}

impl AuthClient {
    /// Sign in and store the returned credentials.
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let body = json!({ "email": email, "password": password });
        let payload = self
            .post_unauthenticated(&self.endpoints.login, &body, &ResponseDecoder::new())
            .await?;

        let login: LoginResponse = serde_json::from_value(payload)
            .map_err(|e| AuthError::Decode(format!("unexpected login response: {e}")))?;
        self.store()
            .set(&login.access, &login.refresh, login.user.clone())?;

        info!("signed in");
        Ok(login)
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// A failed automatic login is not an error; the outcome reports that a
    /// manual sign-in is needed.
    #[tracing::instrument(skip_all)]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterOutcome, AuthError> {
        let body = json!({ "username": username, "email": email, "password": password });
        let registration = self
            .post_unauthenticated(
                &self.endpoints.register,
                &body,
                &ResponseDecoder::with_field_order(&REGISTER_FIELDS),
            )
            .await?;
        info!("account created");

        match self.login(email, password).await {
            Ok(login) => Ok(RegisterOutcome {
                registration,
                login: Some(login),
                auto_login: true,
                login_required: false,
            }),
            Err(e) => {
                warn!("automatic login after registration failed: {e}");
                Ok(RegisterOutcome {
                    registration,
                    login: None,
                    auto_login: false,
                    login_required: true,
                })
            }
        }
    }

    /// Forget the stored credentials.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store().clear()?;
        info!("signed out");
        Ok(())
    }

    /// Check the backend. True only for a 2xx answer.
    #[tracing::instrument(skip_all)]
    pub async fn health(&self) -> bool {
        let result = self
            .http()
            .get(self.url_for(&self.endpoints.health))
            .header(ACCEPT, "application/json")
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("health check failed: {e}");
                false
            }
        }
    }

    /// A usable access token, refreshed first when it is about to expire.
    ///
    /// `Ok(None)` when signed out.
    #[tracing::instrument(skip_all)]
    pub async fn ensure_valid_token(&self) -> Result<Option<String>, AuthError> {
        let Some(credentials) = self.store().get() else {
            return Ok(None);
        };
        if !self
            .inspector()
            .is_expiring_soon(Some(&credentials.access_token))
        {
            return Ok(Some(credentials.access_token));
        }

        debug!("access token expiring soon, refreshing");
        let token = self.refresher().refresh().await?;
        Ok(Some(token))
    }

    async fn post_unauthenticated(
        &self,
        resource: &str,
        body: &Value,
        decoder: &ResponseDecoder,
    ) -> Result<Value, AuthError> {
        let response = self
            .http()
            .post(self.url_for(resource))
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        decoder
            .decode(response)
            .await?
            .ok_or_else(|| AuthError::Decode(format!("empty response from {resource}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
