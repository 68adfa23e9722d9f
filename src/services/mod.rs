// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - backend, identity provider and storage clients.

pub mod api;
pub mod auth;
pub mod federated;
pub mod messages;
pub mod projects;
pub mod storage;
pub mod tasks;

pub use api::ApiClient;
pub use auth::{AuthApi, AuthGrant};
pub use federated::{CredentialGateway, IdentityToolkitGateway};
pub use messages::MessageApi;
pub use projects::ProjectApi;
pub use storage::LocalStorage;
pub use tasks::TaskApi;
