// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable client-side key/value storage.
//!
//! Holds the bearer token and the persisted federated identity across
//! restarts. Values live in memory and are written through to a JSON file
//! when a path is configured.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Identity;

/// Storage key of the backend bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key of the persisted federated identity.
pub const IDENTITY_KEY: &str = "identity";

/// Key/value store shared by the API client, session store and gateway.
#[derive(Clone)]
pub struct LocalStorage {
    entries: Arc<DashMap<String, String>>,
    path: Option<PathBuf>,
}

impl LocalStorage {
    /// Open (or create) the store backed by `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let entries = DashMap::new();

        match std::fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => {
                let saved: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
                    AppError::Storage(format!("Corrupt storage file {}: {}", path.display(), e))
                })?;
                for (k, v) in saved {
                    entries.insert(k, v);
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened client storage");

        Ok(Self {
            entries: Arc::new(entries),
            path: Some(path),
        })
    }

    /// Create a store that only lives in memory.
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            path: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value.into());
        self.flush()
    }

    pub fn remove(&self, key: &str) -> Result<(), AppError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    // ─── Typed Accessors ─────────────────────────────────────────

    /// Bearer token, if a backend session was established.
    pub fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn set_token(&self, token: &str) -> Result<(), AppError> {
        self.set(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> Result<(), AppError> {
        self.remove(TOKEN_KEY)
    }

    /// Persisted federated identity. An unreadable entry counts as absent.
    pub fn identity(&self) -> Option<Identity> {
        let raw = self.get(IDENTITY_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable persisted identity");
                None
            }
        }
    }

    pub fn set_identity(&self, identity: &Identity) -> Result<(), AppError> {
        let raw = serde_json::to_string(identity)
            .map_err(|e| AppError::Storage(format!("Failed to encode identity: {}", e)))?;
        self.set(IDENTITY_KEY, raw)
    }

    pub fn clear_identity(&self) -> Result<(), AppError> {
        self.remove(IDENTITY_KEY)
    }

    /// Write the current contents to disk (temp file + rename).
    fn flush(&self) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let raw = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to encode storage: {}", e)))?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, raw)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }
}
