// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models exchanged with the backend and held in view state.

pub mod envelope;
pub mod message;
pub mod project;
pub mod reference;
pub mod stats;
pub mod task;
pub mod user;

pub use envelope::ApiResponse;
pub use message::Message;
pub use project::{NewProject, Project, ProjectUpdate};
pub use reference::IdOr;
pub use stats::DashboardStats;
pub use task::{NewTask, Task, TaskStatus, TaskUpdate};
pub use user::{Identity, Role, SessionUser, Team, UserSummary};
