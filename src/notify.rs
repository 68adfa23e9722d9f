// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transient user-visible notifications ("toasts").
//!
//! Views never swallow a failure: they publish it here and leave their
//! prior state untouched. Front ends subscribe and render.

use tokio::sync::broadcast;

use crate::error::AppError;

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

/// One toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub text: String,
    /// Set when the failure was a local validation rejection.
    pub validation: bool,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
            validation: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
            validation: false,
        }
    }
}

impl From<&AppError> for Notification {
    fn from(err: &AppError) -> Self {
        Self {
            level: Level::Error,
            text: err.to_string(),
            validation: err.is_validation(),
        }
    }
}

/// Fan-out publisher for notifications. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn success(&self, text: impl Into<String>) {
        self.publish(Notification::success(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.publish(Notification::error(text));
    }

    /// Publish a failure. Validation rejections keep their own message;
    /// everything else is shown as `fallback` (the server detail is logged).
    pub fn failure(&self, err: &AppError, fallback: &str) {
        if err.is_validation() {
            self.publish(Notification::from(err));
        } else {
            tracing::warn!(error = %err, "{}", fallback);
            self.publish(Notification::error(fallback));
        }
    }

    fn publish(&self, notification: Notification) {
        // No subscribers is fine; nobody is rendering toasts.
        let _ = self.tx.send(notification);
    }
}
