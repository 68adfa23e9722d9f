// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend authentication endpoints (`/auth/*`).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Role, SessionUser};
use crate::services::api::ApiClient;

/// Token + profile returned by login and register.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    user: SessionUser,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

/// Backend session endpoints.
#[derive(Clone)]
pub struct AuthApi {
    api: ApiClient,
}

impl AuthApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `POST /auth/login`
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthGrant> {
        self.api
            .post("/auth/login", &LoginBody { email, password })
            .await
    }

    /// `POST /auth/register`
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Option<Role>,
    ) -> Result<AuthGrant> {
        self.api
            .post(
                "/auth/register",
                &RegisterBody {
                    email,
                    password,
                    name,
                    role,
                },
            )
            .await
    }

    /// `GET /auth/me` (bearer)
    pub async fn me(&self) -> Result<SessionUser> {
        let data: ProfileData = self.api.get("/auth/me", &[]).await?;
        Ok(data.user)
    }
}
