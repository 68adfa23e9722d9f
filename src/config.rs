// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000";
const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MESSAGE_LIMIT: u32 = 50;

/// What the task board does with an optimistic move the backend rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragFailurePolicy {
    /// Restore the task's previous lane.
    #[default]
    Revert,
    /// Leave the task in the lane it was dropped into.
    Keep,
}

impl FromStr for DragFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revert" => Ok(Self::Revert),
            "keep" => Ok(Self::Keep),
            _ => Err(ConfigError::Invalid("TEAMHUB_DRAG_FAILURE_POLICY", s.to_string())),
        }
    }
}

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Backend ---
    /// REST API base URL (no trailing slash)
    pub api_url: String,
    /// Realtime channel base URL (ws:// or wss://)
    pub socket_url: String,

    // --- Federated identity provider ---
    /// Identity provider REST base URL
    pub auth_url: String,
    /// Identity provider API key
    pub auth_api_key: String,

    // --- Client behaviour ---
    /// Durable storage file for the bearer token and identity.
    /// `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Realtime handshake timeout
    pub handshake_timeout: Duration,
    /// Chat history page size
    pub message_limit: u32,
    /// Task board behaviour when a drag update fails
    pub drag_failure_policy: DragFailurePolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            api_url: trim_url(env::var("TEAMHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())),
            socket_url: trim_url(
                env::var("TEAMHUB_SOCKET_URL").unwrap_or_else(|_| DEFAULT_SOCKET_URL.to_string()),
            ),
            auth_url: trim_url(env::var("TEAMHUB_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string())),
            auth_api_key: env::var("TEAMHUB_AUTH_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TEAMHUB_AUTH_API_KEY"))?,
            storage_path: env::var("TEAMHUB_STORAGE_PATH").ok().map(PathBuf::from),
            http_timeout: Duration::from_secs(parse_or(
                "TEAMHUB_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            handshake_timeout: Duration::from_secs(parse_or(
                "TEAMHUB_HANDSHAKE_TIMEOUT_SECS",
                DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            )?),
            message_limit: parse_or("TEAMHUB_MESSAGE_LIMIT", DEFAULT_MESSAGE_LIMIT)?,
            drag_failure_policy: match env::var("TEAMHUB_DRAG_FAILURE_POLICY") {
                Ok(v) => v.parse()?,
                Err(_) => DragFailurePolicy::default(),
            },
        })
    }

    /// Default config for testing only, pointed at local mock servers.
    pub fn test_default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            auth_url: "http://localhost:9099/v1".to_string(),
            auth_api_key: "test-api-key".to_string(),
            storage_path: None,
            http_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            message_limit: DEFAULT_MESSAGE_LIMIT,
            drag_failure_policy: DragFailurePolicy::Revert,
        }
    }
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
