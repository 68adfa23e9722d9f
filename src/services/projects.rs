// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Project CRUD endpoints (`/projects`).

use serde::Deserialize;

use crate::error::Result;
use crate::models::{NewProject, Project, ProjectUpdate};
use crate::services::api::ApiClient;

#[derive(Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct ProjectData {
    project: Project,
}

#[derive(Clone)]
pub struct ProjectApi {
    api: ApiClient,
}

impl ProjectApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /projects?teamId=`; without a team the backend decides the scope.
    pub async fn list(&self, team_id: Option<&str>) -> Result<Vec<Project>> {
        let list: ProjectList = self
            .api
            .get("/projects", &[("teamId", team_id.map(str::to_string))])
            .await?;
        Ok(list.projects)
    }

    pub async fn create(&self, project: &NewProject) -> Result<Project> {
        let data: ProjectData = self.api.post("/projects", project).await?;
        Ok(data.project)
    }

    pub async fn update(&self, id: &str, patch: &ProjectUpdate) -> Result<Project> {
        let data: ProjectData = self.api.put(&format!("/projects/{}", id), patch).await?;
        Ok(data.project)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete(&format!("/projects/{}", id)).await
    }
}
