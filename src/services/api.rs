// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend REST client core.
//!
//! Handles:
//! - Bearer token attachment from durable storage
//! - Envelope decoding (`{success, message, data?, errors?}`)
//! - Normalizing every failure into one error carrying the server message

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::envelope::error_message;
use crate::models::ApiResponse;
use crate::services::storage::LocalStorage;

/// HTTP client for the application backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    storage: LocalStorage,
}

impl ApiClient {
    /// Create a client for `config.api_url`, reading the bearer token from `storage`.
    pub fn new(config: &Config, storage: LocalStorage) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed building API HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            storage,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET with query parameters; `None` values are omitted.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, Option<String>)],
    ) -> Result<T> {
        let params: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();
        let request = self.request(Method::GET, path).query(&params);
        self.send_json::<T>(request).await?.into_data()
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, path).json(body);
        self.send_json::<T>(request).await?.into_data()
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::PUT, path).json(body);
        self.send_json::<T>(request).await?.into_data()
    }

    /// DELETE; the envelope's `data` is ignored.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let request = self.request(Method::DELETE, path);
        self.send_json::<serde_json::Value>(request)
            .await?
            .into_result()?;
        Ok(())
    }

    /// Build a request, attaching the stored bearer token when present.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match self.storage.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Backend request failed");
            AppError::Network(e.to_string())
        })?;
        check_response_json(response).await
    }
}

/// Check response status and decode the envelope.
async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<ApiResponse<T>> {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
            .map(|env| error_message(&env.message))
            .unwrap_or_else(|_| AppError::DEFAULT_MESSAGE.to_string());

        tracing::debug!(status = status.as_u16(), path = %url, message = %message, "Backend error response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(message));
        }
        return Err(AppError::Network(message));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(path = %url, error = %e, "Undecodable backend response");
        AppError::Network(format!("Invalid response from server: {e}"))
    })
}
