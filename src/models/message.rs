// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat message model and sender resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reference::{HasId, IdOr};
use super::user::{SessionUser, Team, UserSummary};

const UNKNOWN_SENDER: &str = "Unknown";
const UNKNOWN_INITIALS: &str = "U";

/// Chat message. View state treats messages as append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub content: String,
    pub sender_id: IdOr<UserSummary>,
    pub team_id: IdOr<Team>,
    pub timestamp: DateTime<Utc>,
}

impl HasId for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Message {
    /// Whether `user` sent this message, whichever form the sender took.
    pub fn is_own(&self, user: &SessionUser) -> bool {
        self.sender_id.id() == user.id
    }

    /// Sender display name; only known when the backend embedded the user.
    pub fn sender_name(&self) -> &str {
        self.sender_id
            .embedded()
            .map(|u| u.name.as_str())
            .unwrap_or(UNKNOWN_SENDER)
    }

    /// Avatar initials for the sender.
    pub fn sender_initials(&self) -> String {
        match self.sender_id.embedded() {
            Some(user) => initials(&user.name),
            None => UNKNOWN_INITIALS.to_string(),
        }
    }
}

fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();
    if letters.is_empty() {
        UNKNOWN_INITIALS.to_string()
    } else {
        letters
    }
}
