// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard statistics.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::DashboardStats;
use crate::views::ViewScope;
use crate::AppState;

pub struct DashboardView {
    app: Arc<AppState>,
    stats: watch::Sender<DashboardStats>,
    scope: ViewScope,
}

impl DashboardView {
    pub fn new(app: Arc<AppState>) -> Self {
        let (stats, _) = watch::channel(DashboardStats::default());
        Self {
            app,
            stats,
            scope: ViewScope::new(),
        }
    }

    pub fn stats(&self) -> DashboardStats {
        *self.stats.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardStats> {
        self.stats.subscribe()
    }

    /// Fetch projects and tasks concurrently and recompute the counters.
    /// On failure the previous counters stay.
    pub async fn refresh(&self) -> Result<DashboardStats> {
        let team_id = self.app.session.current_user().and_then(|u| u.team_id);

        let fetched = self
            .scope
            .run(async {
                tokio::try_join!(
                    self.app.projects.list(team_id.as_deref()),
                    self.app.tasks.list(None),
                )
            })
            .await;

        match fetched {
            None => Ok(self.stats()),
            Some(Ok((projects, tasks))) => {
                let stats = DashboardStats::compute(&projects, &tasks);
                tracing::debug!(?stats, "Dashboard stats computed");
                self.stats.send_replace(stats);
                Ok(stats)
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to fetch stats");
                self.app.notifier.failure(&e, "Failed to fetch stats");
                Err(e)
            }
        }
    }
}
