// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TeamHub headless client
//!
//! Signs in with `TEAMHUB_EMAIL` / `TEAMHUB_PASSWORD`, prints the dashboard
//! counters, then follows the team chat until Ctrl-C and signs out.

use anyhow::Context;
use teamhub::{
    config::Config,
    notify::Level,
    views::{ChatView, DashboardView},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(api = %config.api_url, socket = %config.socket_url, "Starting TeamHub client");

    let app = AppState::build(config).context("Failed to initialize client")?;

    // Surface toasts in the log.
    let mut toasts = app.notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(toast) = toasts.recv().await {
            match toast.level {
                Level::Success => tracing::info!(text = %toast.text, "Notification"),
                Level::Error => tracing::warn!(text = %toast.text, "Notification"),
            }
        }
    });

    let observer = app.session.start_observer();
    let snapshot = app.session.wait_until_loaded().await;

    if snapshot.user.is_none() {
        let email = std::env::var("TEAMHUB_EMAIL").context("TEAMHUB_EMAIL not set")?;
        let password = std::env::var("TEAMHUB_PASSWORD").context("TEAMHUB_PASSWORD not set")?;
        app.session.login(&email, &password).await?;
    }

    let user = app.session.current_user().context("No signed-in user")?;
    tracing::info!(user = %user.name, role = ?user.role, team = ?user.team_id, "Signed in");

    let dashboard = DashboardView::new(app.clone());
    if let Ok(stats) = dashboard.refresh().await {
        tracing::info!(
            projects = stats.total_projects,
            tasks = stats.total_tasks,
            in_progress = stats.in_progress,
            completed = stats.completed,
            "Dashboard"
        );
    }

    match ChatView::mount(app.clone()) {
        Ok(chat) => {
            let mut updates = chat.subscribe();
            let mut shown = 0;
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = updates.borrow_and_update().clone();
                        // History replaces the list; start over when it shrinks.
                        if state.messages.len() < shown {
                            shown = 0;
                        }
                        for message in &state.messages[shown..] {
                            tracing::info!(
                                from = %message.sender_name(),
                                own = message.is_own(&user),
                                at = %message.timestamp,
                                "{}",
                                message.content
                            );
                        }
                        shown = state.messages.len();
                    }
                }
            }
            chat.unmount();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chat unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }

    if let Err(e) = app.session.logout().await {
        tracing::warn!(error = %e, "Logout incomplete");
    }
    app.session.shutdown();
    let _ = observer.await;

    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("teamhub=debug".parse().expect("static directive"))
                .add_directive("info".parse().expect("static directive")),
        )
        .with(format)
        .init();
}
