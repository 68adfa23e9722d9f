// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task board reconciler.
//!
//! Drag-and-drop moves are optimistic: the lane changes locally before the
//! backend confirms. What happens on failure is governed by
//! [`DragFailurePolicy`]. Creates and deletes wait for the backend.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::config::DragFailurePolicy;
use crate::error::{AppError, Result};
use crate::models::{NewTask, Project, Task, TaskStatus, TaskUpdate};
use crate::realtime::SubscriptionId;
use crate::views::{guarded, ViewScope};
use crate::AppState;

/// Board view model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    pub projects: Vec<Project>,
    pub selected_project: Option<String>,
    /// Tasks of the selected project.
    pub tasks: Vec<Task>,
    pub loading: bool,
    /// Server copies received while the task list was loading.
    pending: Vec<Task>,
}

#[derive(Debug, Clone)]
pub enum BoardAction {
    ProjectsLoaded(Vec<Project>),
    ProjectSelected(String),
    TasksLoaded { project_id: String, tasks: Vec<Task> },
    /// A task load failed, or with `None` the project list did.
    LoadFailed { project_id: Option<String> },
    /// Optimistic lane change.
    Moved { task_id: String, status: TaskStatus },
    /// Undo a failed move, unless something newer already moved the task.
    Reverted {
        task_id: String,
        optimistic: TaskStatus,
        previous: TaskStatus,
    },
    /// Server copy of a task, from a response or a push.
    Upserted(Task),
    Deleted(String),
}

impl BoardState {
    /// Apply `action`. For `Moved` returns the status the task had before.
    pub fn apply(&mut self, action: BoardAction) -> Option<TaskStatus> {
        match action {
            BoardAction::ProjectsLoaded(projects) => {
                self.projects = projects;
            }
            BoardAction::ProjectSelected(project_id) => {
                self.selected_project = Some(project_id);
                self.tasks.clear();
                self.pending.clear();
                self.loading = true;
            }
            BoardAction::TasksLoaded { project_id, tasks } => {
                if self.selected_project.as_deref() != Some(project_id.as_str()) {
                    tracing::debug!(project_id = %project_id, "Dropping tasks of a deselected project");
                    return None;
                }
                self.tasks = tasks;
                self.finish_loading();
            }
            BoardAction::LoadFailed { project_id } => {
                if project_id.is_some() && project_id != self.selected_project {
                    tracing::debug!(project_id = ?project_id, "Ignoring failed load of a deselected project");
                    return None;
                }
                self.finish_loading();
            }
            BoardAction::Moved { task_id, status } => {
                let task = self.tasks.iter_mut().find(|t| t.id == task_id)?;
                let previous = task.status;
                task.status = status;
                return Some(previous);
            }
            BoardAction::Reverted {
                task_id,
                optimistic,
                previous,
            } => {
                if let Some(task) = self
                    .tasks
                    .iter_mut()
                    .find(|t| t.id == task_id && t.status == optimistic)
                {
                    task.status = previous;
                }
            }
            BoardAction::Upserted(task) if self.loading => {
                self.pending.push(task);
            }
            BoardAction::Upserted(task) => {
                let belongs = self.selected_project.as_deref() == Some(task.project_id.id());
                let existing = self.tasks.iter().position(|t| t.id == task.id);
                match (belongs, existing) {
                    (true, Some(i)) => self.tasks[i] = task,
                    (true, None) => self.tasks.push(task),
                    // Moved to another project.
                    (false, Some(i)) => {
                        self.tasks.remove(i);
                    }
                    (false, None) => {}
                }
            }
            BoardAction::Deleted(task_id) => {
                self.tasks.retain(|t| t.id != task_id);
            }
        }
        None
    }

    /// Replay server copies held back while loading.
    fn finish_loading(&mut self) {
        self.loading = false;
        for task in std::mem::take(&mut self.pending) {
            self.apply(BoardAction::Upserted(task));
        }
    }

    /// Number of server copies held back until the task list arrives.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Tasks in one lane, in list order.
    pub fn lane(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// A mounted task board.
pub struct BoardView {
    app: Arc<AppState>,
    state: Arc<watch::Sender<BoardState>>,
    subscription: Option<SubscriptionId>,
    policy: DragFailurePolicy,
    scope: ViewScope,
}

impl BoardView {
    /// Mount: load the team's projects, select the first and load its tasks,
    /// then apply pushed task updates.
    pub fn mount(app: Arc<AppState>) -> Self {
        let (state, _) = watch::channel(BoardState {
            loading: true,
            ..BoardState::default()
        });
        let state = Arc::new(state);

        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let subscription = app.channel.on_task_update(push_tx);

        let scope = ViewScope::new();
        tokio::spawn(run_board(app.clone(), state.clone(), push_rx, scope.token()));

        Self {
            policy: app.config.drag_failure_policy,
            app,
            state,
            subscription,
            scope,
        }
    }

    /// Override the configured drag failure policy for this view.
    pub fn with_policy(mut self, policy: DragFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Wait for the current load to finish.
    pub async fn loaded(&self) -> BoardState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Switch to `project_id` and reload its tasks.
    pub async fn select_project(&self, project_id: &str) -> Result<()> {
        reduce(&self.state, BoardAction::ProjectSelected(project_id.to_string()));
        load_tasks(&self.app, &self.state, &self.scope.token(), project_id).await
    }

    /// Drop `task_id` into lane `status`.
    ///
    /// The lane changes immediately. If the backend rejects the change the
    /// task is moved back under [`DragFailurePolicy::Revert`] or left where
    /// it was dropped under [`DragFailurePolicy::Keep`].
    pub async fn move_task(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let mut previous = None;
        self.state.send_if_modified(|s| {
            previous = s.apply(BoardAction::Moved {
                task_id: task_id.to_string(),
                status,
            });
            previous.is_some_and(|p| p != status)
        });

        let Some(previous) = previous else {
            let e = AppError::Validation(format!("Task {task_id} is not on the board"));
            self.app.notifier.failure(&e, "Failed to update task");
            return Err(e);
        };
        if previous == status {
            return Ok(());
        }
        tracing::debug!(task_id = %task_id, from = %previous, to = %status, "Task moved");

        match self.app.tasks.update(task_id, &TaskUpdate::status(status)).await {
            Ok(task) => {
                reduce(&self.state, BoardAction::Upserted(task));
                self.app.notifier.success("Task updated successfully");
                Ok(())
            }
            Err(e) => {
                match self.policy {
                    DragFailurePolicy::Revert => {
                        tracing::info!(task_id = %task_id, to = %previous, "Reverting failed move");
                        reduce(
                            &self.state,
                            BoardAction::Reverted {
                                task_id: task_id.to_string(),
                                optimistic: status,
                                previous,
                            },
                        );
                    }
                    DragFailurePolicy::Keep => {
                        tracing::info!(task_id = %task_id, status = %status, "Keeping failed move");
                    }
                }
                self.app.notifier.failure(&e, "Failed to update task");
                Err(e)
            }
        }
    }

    /// Create a task in the `todo` lane of the selected project.
    pub async fn create_task(&self, title: &str, description: Option<&str>) -> Result<Task> {
        let project_id = self.state.borrow().selected_project.clone().unwrap_or_default();
        let new_task = NewTask {
            title: title.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            status: TaskStatus::Todo,
            project_id,
        };

        let created = match new_task.validate() {
            Ok(()) => self.app.tasks.create(&new_task).await,
            Err(e) => Err(AppError::from(e)),
        };

        match created {
            Ok(task) => {
                tracing::info!(task_id = %task.id, "Task created");
                reduce(&self.state, BoardAction::Upserted(task.clone()));
                self.app.notifier.success("Task created successfully");
                Ok(task)
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to create task");
                Err(e)
            }
        }
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        match self.app.tasks.delete(task_id).await {
            Ok(()) => {
                tracing::info!(task_id = %task_id, "Task deleted");
                reduce(&self.state, BoardAction::Deleted(task_id.to_string()));
                self.app.notifier.success("Task deleted successfully");
                Ok(())
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to delete task");
                Err(e)
            }
        }
    }
}

impl Drop for BoardView {
    fn drop(&mut self) {
        self.scope.close();
        if let Some(id) = self.subscription.take() {
            self.app.channel.release(id);
        }
    }
}

fn reduce(state: &watch::Sender<BoardState>, action: BoardAction) {
    state.send_modify(|s| {
        s.apply(action);
    });
}

async fn load_tasks(
    app: &AppState,
    state: &watch::Sender<BoardState>,
    cancel: &CancellationToken,
    project_id: &str,
) -> Result<()> {
    let Some(result) = guarded(cancel, app.tasks.list(Some(project_id))).await else {
        return Ok(());
    };
    match result {
        Ok(tasks) => {
            tracing::debug!(project_id = %project_id, count = tasks.len(), "Tasks loaded");
            reduce(
                state,
                BoardAction::TasksLoaded {
                    project_id: project_id.to_string(),
                    tasks,
                },
            );
            Ok(())
        }
        Err(e) => {
            app.notifier.failure(&e, "Failed to fetch tasks");
            reduce(
                state,
                BoardAction::LoadFailed {
                    project_id: Some(project_id.to_string()),
                },
            );
            Err(e)
        }
    }
}

async fn run_board(
    app: Arc<AppState>,
    state: Arc<watch::Sender<BoardState>>,
    mut pushes: mpsc::UnboundedReceiver<Task>,
    cancel: CancellationToken,
) {
    let team_id = app.session.current_user().and_then(|u| u.team_id);

    match guarded(&cancel, app.projects.list(team_id.as_deref())).await {
        None => return,
        Some(Ok(projects)) => {
            let first = projects.first().map(|p| p.id.clone());
            reduce(&state, BoardAction::ProjectsLoaded(projects));
            match first {
                Some(project_id) => {
                    reduce(&state, BoardAction::ProjectSelected(project_id.clone()));
                    // Failure is already notified.
                    let _ = load_tasks(&app, &state, &cancel, &project_id).await;
                }
                None => reduce(&state, BoardAction::LoadFailed { project_id: None }),
            }
        }
        Some(Err(e)) => {
            app.notifier.failure(&e, "Failed to fetch projects");
            reduce(&state, BoardAction::LoadFailed { project_id: None });
        }
    }

    // Pushes queued during the initial load land on top of it.
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            pushed = pushes.recv() => match pushed {
                Some(task) => {
                    tracing::debug!(task_id = %task.id, status = %task.status, "Task update pushed");
                    reduce(&state, BoardAction::Upserted(task));
                }
                None => break,
            },
        }
    }
}
