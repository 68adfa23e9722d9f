// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TeamHub: headless client core for the team-collaboration backend
//!
//! This crate provides the session and realtime synchronization layer
//! (federated + backend authentication, a single push channel) and the
//! reconcilers that merge fetched and pushed state for the chat, task
//! board, projects and dashboard views.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod services;
pub mod session;
pub mod views;

use std::sync::Arc;

use config::Config;
use error::Result;
use notify::Notifier;
use realtime::RealtimeChannel;
use services::{
    ApiClient, AuthApi, CredentialGateway, IdentityToolkitGateway, LocalStorage, MessageApi,
    ProjectApi, TaskApi,
};
use session::SessionStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub storage: LocalStorage,
    pub channel: Arc<RealtimeChannel>,
    pub session: Arc<SessionStore>,
    pub projects: ProjectApi,
    pub tasks: TaskApi,
    pub messages: MessageApi,
    pub notifier: Notifier,
}

impl AppState {
    /// Wire up the production stack: file or memory storage and the
    /// Identity Toolkit gateway.
    pub fn build(config: Config) -> Result<Arc<Self>> {
        let storage = match &config.storage_path {
            Some(path) => LocalStorage::open(path)?,
            None => LocalStorage::in_memory(),
        };
        let gateway = Arc::new(IdentityToolkitGateway::new(&config, storage.clone())?);
        Self::with_gateway(config, storage, gateway)
    }

    /// Wire up the stack around an explicit credential gateway.
    pub fn with_gateway(
        config: Config,
        storage: LocalStorage,
        gateway: Arc<dyn CredentialGateway>,
    ) -> Result<Arc<Self>> {
        let api = ApiClient::new(&config, storage.clone())?;
        let channel = Arc::new(RealtimeChannel::new(&config));
        let notifier = Notifier::new();

        let session = Arc::new(SessionStore::new(
            gateway,
            AuthApi::new(api.clone()),
            storage.clone(),
            channel.clone(),
            notifier.clone(),
        ));

        tracing::debug!(api = %api.base_url(), socket = %config.socket_url, "Client state initialized");

        Ok(Arc::new(Self {
            projects: ProjectApi::new(api.clone()),
            tasks: TaskApi::new(api.clone()),
            messages: MessageApi::new(api),
            config,
            storage,
            channel,
            session,
            notifier,
        }))
    }
}
