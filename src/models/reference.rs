// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Foreign-key fields the backend may or may not populate.

use serde::{Deserialize, Serialize};

/// A reference that arrives either as a bare id or as the embedded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdOr<T> {
    Id(String),
    Embedded(T),
}

/// Documents that carry their own id.
pub trait HasId {
    fn id(&self) -> &str;
}

impl<T: HasId> IdOr<T> {
    /// The referenced id, whichever form arrived.
    pub fn id(&self) -> &str {
        match self {
            IdOr::Id(id) => id,
            IdOr::Embedded(doc) => doc.id(),
        }
    }

    /// The embedded document, if the backend populated it.
    pub fn embedded(&self) -> Option<&T> {
        match self {
            IdOr::Id(_) => None,
            IdOr::Embedded(doc) => Some(doc),
        }
    }
}

impl<T> From<String> for IdOr<T> {
    fn from(id: String) -> Self {
        IdOr::Id(id)
    }
}

impl<T> From<&str> for IdOr<T> {
    fn from(id: &str) -> Self {
        IdOr::Id(id.to_string())
    }
}
