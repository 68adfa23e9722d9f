// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard aggregates computed client-side from project and task lists.

use serde::{Deserialize, Serialize};

use crate::models::{Project, Task, TaskStatus};

/// Counts shown on the dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_projects: usize,
    pub total_tasks: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl DashboardStats {
    /// Aggregate counts over freshly fetched lists.
    pub fn compute(projects: &[Project], tasks: &[Task]) -> Self {
        Self {
            total_projects: projects.len(),
            total_tasks: tasks.len(),
            in_progress: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count(),
            completed: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
        }
    }
}
