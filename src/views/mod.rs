// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! View reconcilers.
//!
//! Each view owns its state behind a `watch` channel and routes every
//! mutation, fetched or pushed, through one reducer. Async work is bound to
//! the view's [`ViewScope`]; results that resolve after unmount are dropped.

pub mod board;
pub mod chat;
pub mod dashboard;
pub mod projects;

pub use board::{BoardAction, BoardState, BoardView};
pub use chat::{ChatEvent, ChatPhase, ChatState, ChatView};
pub use dashboard::DashboardView;
pub use projects::{ProjectsState, ProjectsView};

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Cancellation scope tied to a mounted view. Cancels on drop.
#[derive(Debug, Default)]
pub struct ViewScope {
    cancel: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `fut` unless the view is torn down first.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        guarded(&self.cancel, fut).await
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => if cancel.is_cancelled() { None } else { Some(out) },
    }
}
