// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error taxonomy shared by the session, channel and view layers.

use crate::config::ConfigError;

/// Application error type surfaced to views and callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Federated or backend credential failure.
    #[error("{0}")]
    Auth(String),

    /// Backend rejected the bearer token (HTTP 401). The user must re-authenticate.
    #[error("{0}")]
    Unauthorized(String),

    /// REST call failure, carrying the server-supplied message.
    #[error("{0}")]
    Network(String),

    /// Realtime transport failure.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A required field was missing before a call was attempted.
    #[error("{0}")]
    Validation(String),

    /// Durable client storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Fallback message used when the backend does not supply one.
    pub const DEFAULT_MESSAGE: &'static str = "An error occurred";

    /// Whether the failure means the stored token is stale and the user
    /// should sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, AppError::Unauthorized(_))
    }

    /// Whether the error was raised locally before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    /// Re-tag a resource-layer failure as an authentication failure,
    /// keeping the server message intact.
    pub fn into_auth(self) -> AppError {
        match self {
            AppError::Auth(msg) => AppError::Auth(msg),
            AppError::Network(msg) | AppError::Unauthorized(msg) => AppError::Auth(msg),
            other => AppError::Auth(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                errs.iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
            .collect();
        AppError::Validation(fields.join(", "))
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, AppError>;
