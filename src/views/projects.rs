// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Projects page reconciler. Every mutation waits for the backend.

use std::sync::Arc;
use tokio::sync::watch;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{NewProject, Project, ProjectUpdate};
use crate::views::ViewScope;
use crate::AppState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectsState {
    pub projects: Vec<Project>,
    pub loading: bool,
}

pub struct ProjectsView {
    app: Arc<AppState>,
    state: watch::Sender<ProjectsState>,
    scope: ViewScope,
}

impl ProjectsView {
    /// Mount and load the projects of the user's team.
    pub async fn mount(app: Arc<AppState>) -> Self {
        let (state, _) = watch::channel(ProjectsState {
            projects: Vec::new(),
            loading: true,
        });
        let view = Self {
            app,
            state,
            scope: ViewScope::new(),
        };
        // Failure is notified; the list stays empty.
        let _ = view.refresh().await;
        view
    }

    pub fn state(&self) -> ProjectsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectsState> {
        self.state.subscribe()
    }

    /// Whether the session user may create, edit and delete projects.
    pub fn can_manage(&self) -> bool {
        self.app
            .session
            .current_user()
            .is_some_and(|u| u.role.can_manage_projects())
    }

    pub async fn refresh(&self) -> Result<()> {
        self.state.send_modify(|s| s.loading = true);
        let team_id = self.app.session.current_user().and_then(|u| u.team_id);

        let Some(result) = self.scope.run(self.app.projects.list(team_id.as_deref())).await else {
            return Ok(());
        };
        match result {
            Ok(projects) => {
                tracing::debug!(count = projects.len(), "Projects loaded");
                self.state.send_modify(|s| {
                    s.projects = projects;
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to fetch projects");
                self.state.send_modify(|s| s.loading = false);
                Err(e)
            }
        }
    }

    /// Create a project in the user's team. Without a team nothing is sent.
    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let created = match self.app.session.require_team("create projects") {
            Ok(team_id) => {
                let project = NewProject {
                    name: name.trim().to_string(),
                    description: description
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                    team_id,
                };
                match project.validate() {
                    Ok(()) => self.app.projects.create(&project).await,
                    Err(e) => Err(AppError::from(e)),
                }
            }
            Err(e) => Err(e),
        };

        match created {
            Ok(project) => {
                tracing::info!(project_id = %project.id, "Project created");
                self.state.send_modify(|s| s.projects.push(project.clone()));
                self.app.notifier.success("Project created successfully");
                Ok(project)
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to create project");
                Err(e)
            }
        }
    }

    pub async fn update(&self, project_id: &str, patch: &ProjectUpdate) -> Result<Project> {
        match self.app.projects.update(project_id, patch).await {
            Ok(project) => {
                self.state.send_modify(|s| {
                    match s.projects.iter_mut().find(|p| p.id == project.id) {
                        Some(existing) => *existing = project.clone(),
                        None => s.projects.push(project.clone()),
                    }
                });
                self.app.notifier.success("Project updated successfully");
                Ok(project)
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to update project");
                Err(e)
            }
        }
    }

    pub async fn delete(&self, project_id: &str) -> Result<()> {
        match self.app.projects.delete(project_id).await {
            Ok(()) => {
                tracing::info!(project_id = %project_id, "Project deleted");
                self.state.send_modify(|s| s.projects.retain(|p| p.id != project_id));
                self.app.notifier.success("Project deleted successfully");
                Ok(())
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to delete project");
                Err(e)
            }
        }
    }
}
