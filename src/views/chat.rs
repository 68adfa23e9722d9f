// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team chat reconciler.
//!
//! History fetch and push delivery start together. The reducer holds
//! pushes that land while history is still loading and appends them after
//! it, so the history result can never overwrite them. Messages are kept
//! in arrival order and are not de-duplicated: a message that is both in
//! the fetched history and pushed shows up twice.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::Result;
use crate::models::{Message, SessionUser};
use crate::realtime::SubscriptionId;
use crate::views::ViewScope;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Loading,
    Live,
}

/// Chat view model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub phase: ChatPhase,
    /// Displayed sequence, arrival order.
    pub messages: Vec<Message>,
    /// Pushes received while loading.
    pending: Vec<Message>,
}

/// Everything that can change the chat view model.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Mounted,
    HistoryLoaded(Vec<Message>),
    HistoryFailed,
    Pushed(Message),
    Unmounted,
}

impl ChatState {
    pub fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Mounted => {
                self.phase = ChatPhase::Loading;
                self.messages.clear();
                self.pending.clear();
            }
            ChatEvent::HistoryLoaded(history) => {
                self.messages = history;
                self.messages.append(&mut self.pending);
                self.phase = ChatPhase::Live;
            }
            ChatEvent::HistoryFailed => {
                self.messages.append(&mut self.pending);
                self.phase = ChatPhase::Live;
            }
            ChatEvent::Pushed(message) => match self.phase {
                ChatPhase::Loading => self.pending.push(message),
                ChatPhase::Live => self.messages.push(message),
                ChatPhase::Idle => {
                    tracing::trace!(id = %message.id, "Push after unmount dropped");
                }
            },
            ChatEvent::Unmounted => {
                self.phase = ChatPhase::Idle;
                self.pending.clear();
            }
        }
    }

    /// Number of pushes held back until history arrives.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Messages `user` sent, whichever sender form the backend used.
    pub fn own_messages<'a>(&'a self, user: &'a SessionUser) -> impl Iterator<Item = &'a Message> {
        self.messages.iter().filter(move |m| m.is_own(user))
    }
}

/// A mounted chat view for the session user's team.
pub struct ChatView {
    app: Arc<AppState>,
    team_id: String,
    state: Arc<watch::Sender<ChatState>>,
    subscription: Option<SubscriptionId>,
    scope: ViewScope,
}

impl ChatView {
    /// Mount: fetch history, subscribe to pushes and join the team room.
    ///
    /// Fails with a validation error when the user has no team.
    pub fn mount(app: Arc<AppState>) -> Result<Self> {
        let team_id = match app.session.require_team("chat") {
            Ok(team_id) => team_id,
            Err(e) => {
                app.notifier.failure(&e, "Failed to fetch messages");
                return Err(e);
            }
        };

        let (state, _) = watch::channel(ChatState::default());
        let state = Arc::new(state);
        state.send_modify(|s| s.apply(ChatEvent::Mounted));

        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let subscription = app.channel.on_message(push_tx);
        if subscription.is_none() {
            tracing::warn!(team_id = %team_id, "Chat mounted without a realtime channel; history only");
        }
        app.channel.join_team(&team_id);

        let scope = ViewScope::new();
        tokio::spawn(run_chat(
            app.clone(),
            team_id.clone(),
            state.clone(),
            push_rx,
            scope.token(),
        ));

        tracing::debug!(team_id = %team_id, "Chat view mounted");

        Ok(Self {
            app,
            team_id,
            state,
            subscription,
            scope,
        })
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    /// Post a message. Blank input is ignored. The stored message comes
    /// back as a push, so nothing is appended locally.
    pub async fn send(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        match self.app.messages.send(&self.team_id, text).await {
            Ok(message) => {
                tracing::debug!(id = %message.id, "Message sent");
                Ok(())
            }
            Err(e) => {
                self.app.notifier.failure(&e, "Failed to send message");
                Err(e)
            }
        }
    }

    /// Tear down: cancel in-flight work, drop the push handler, leave the room.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.scope.close();
        // Only the view that still owns the handler owns the room membership.
        if let Some(id) = self.subscription.take() {
            if self.app.channel.release(id) {
                self.app.channel.leave_team(&self.team_id);
            }
        }
        self.state.send_modify(|s| s.apply(ChatEvent::Unmounted));
        tracing::debug!(team_id = %self.team_id, "Chat view unmounted");
    }
}

async fn run_chat(
    app: Arc<AppState>,
    team_id: String,
    state: Arc<watch::Sender<ChatState>>,
    mut pushes: mpsc::UnboundedReceiver<Message>,
    cancel: tokio_util::sync::CancellationToken,
) {
    let history = app.messages.history(&team_id, app.config.message_limit);
    tokio::pin!(history);
    let mut loaded = false;
    let mut pushes_open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = &mut history, if !loaded => {
                loaded = true;
                if cancel.is_cancelled() {
                    break;
                }
                match result {
                    Ok(messages) => {
                        tracing::debug!(count = messages.len(), "Chat history loaded");
                        state.send_modify(|s| s.apply(ChatEvent::HistoryLoaded(messages)));
                    }
                    Err(e) => {
                        app.notifier.failure(&e, "Failed to fetch messages");
                        state.send_modify(|s| s.apply(ChatEvent::HistoryFailed));
                    }
                }
            }
            pushed = pushes.recv(), if pushes_open => match pushed {
                Some(message) => state.send_modify(|s| s.apply(ChatEvent::Pushed(message))),
                None => pushes_open = false,
            },
            else => break,
        }
    }
}
