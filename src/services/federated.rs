// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Federated identity provider gateway.
//!
//! The provider owns email/password credentials; the backend owns the
//! application session. This module only speaks to the provider and
//! publishes identity changes on a `watch` channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Identity;
use crate::services::storage::LocalStorage;

/// Contract of the federated identity provider.
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    /// Email/password sign-in.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    /// Create a provider account and sign it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity>;

    /// End the federated session.
    async fn sign_out(&self) -> Result<()>;

    /// Identity right now, if signed in.
    fn current(&self) -> Option<Identity>;

    /// Identity-change notifications. The receiver starts at the current value.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    id_token: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
}

/// Gateway for an Identity Toolkit–style REST provider.
///
/// Sign-out is local. The identity is persisted in [`LocalStorage`] so a
/// restarted client re-emits it, which is what restores the session.
pub struct IdentityToolkitGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    storage: LocalStorage,
    state: watch::Sender<Option<Identity>>,
}

impl IdentityToolkitGateway {
    pub fn new(config: &Config, storage: LocalStorage) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("failed building identity HTTP client: {e}"))
            })?;

        let restored = storage.identity();
        if let Some(identity) = &restored {
            tracing::info!(uid = %identity.uid, "Restored federated identity");
        }
        let (state, _) = watch::channel(restored);

        Ok(Self {
            http,
            base_url: config.auth_url.clone(),
            api_key: config.auth_api_key.clone(),
            storage,
            state,
        })
    }

    async fn password_call(&self, endpoint: &str, email: &str, password: &str) -> Result<Identity> {
        let url = format!("{}/accounts:{}", self.base_url, endpoint);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Identity provider unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let code = serde_json::from_str::<ProviderErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_default();
            tracing::debug!(status = status.as_u16(), code = %code, "Identity provider rejected request");
            return Err(AppError::Auth(describe_provider_error(&code)));
        }

        let parsed: PasswordResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Auth(format!("Invalid identity provider response: {}", e)))?;

        let identity = Identity {
            uid: parsed.local_id,
            email: parsed.email.unwrap_or_else(|| email.to_string()),
            id_token: parsed.id_token,
        };
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    fn publish(&self, identity: Option<Identity>) {
        let persisted = match &identity {
            Some(identity) => self.storage.set_identity(identity),
            None => self.storage.clear_identity(),
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "Failed to persist federated identity");
        }
        self.state.send_replace(identity);
    }
}

#[async_trait]
impl CredentialGateway for IdentityToolkitGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.publish(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

/// Map provider error codes to user-facing text.
fn describe_provider_error(code: &str) -> String {
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".to_string()
        }
        "EMAIL_EXISTS" => "Email is already in use".to_string(),
        "USER_DISABLED" => "This account has been disabled".to_string(),
        c if c.starts_with("WEAK_PASSWORD") => "Password is too weak".to_string(),
        c if c.starts_with("TOO_MANY_ATTEMPTS_TRY_LATER") => {
            "Too many attempts, try again later".to_string()
        }
        "" => "Authentication failed".to_string(),
        other => other.to_string(),
    }
}
