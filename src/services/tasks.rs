// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task CRUD endpoints (`/tasks`).

use serde::Deserialize;

use crate::error::Result;
use crate::models::{NewTask, Task, TaskUpdate};
use crate::services::api::ApiClient;

#[derive(Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
struct TaskData {
    task: Task,
}

#[derive(Clone)]
pub struct TaskApi {
    api: ApiClient,
}

impl TaskApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /tasks?projectId=`; `None` lists every task visible to the user.
    pub async fn list(&self, project_id: Option<&str>) -> Result<Vec<Task>> {
        let list: TaskList = self
            .api
            .get("/tasks", &[("projectId", project_id.map(str::to_string))])
            .await?;
        Ok(list.tasks)
    }

    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        let data: TaskData = self.api.post("/tasks", task).await?;
        Ok(data.task)
    }

    pub async fn update(&self, id: &str, patch: &TaskUpdate) -> Result<Task> {
        let data: TaskData = self.api.put(&format!("/tasks/{}", id), patch).await?;
        Ok(data.task)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete(&format!("/tasks/{}", id)).await
    }
}
