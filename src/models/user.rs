// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session user, team and federated identity models.

use serde::{Deserialize, Serialize};

use super::reference::HasId;

/// Authorization role assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    Member,
}

impl Role {
    /// Whether the role may create, edit and delete projects.
    pub fn can_manage_projects(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// Application user profile, as returned by the backend.
///
/// This is the single source of truth for authorization decisions in views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<String>,
}

impl HasId for SessionUser {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Populated user reference embedded in messages and tasks. The backend
/// may select only a subset of profile fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl HasId for UserSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Team document; only ever seen embedded in other documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub admin_id: Option<String>,
}

impl HasId for Team {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Identity issued by the federated provider. Exists only while the
/// federated session is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned opaque user id
    pub uid: String,
    pub email: String,
    /// Provider ID token (never logged)
    #[serde(default)]
    pub id_token: String,
}
