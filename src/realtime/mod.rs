// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime push channel (chat messages and task updates).

pub mod channel;
pub mod protocol;

pub use channel::RealtimeChannel;
pub use protocol::{Packet, ProtocolError};

/// Identifies one push handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub kind: EventKind,
    seq: u64,
}

/// Server-to-client events a view can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `new-message`
    NewMessage,
    /// `task-updated`
    TaskUpdated,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewMessage => "new-message",
            EventKind::TaskUpdated => "task-updated",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "new-message" => Some(EventKind::NewMessage),
            "task-updated" => Some(EventKind::TaskUpdated),
            _ => None,
        }
    }
}
