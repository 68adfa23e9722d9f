// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response envelope wrapping every backend reply.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// `{success, message, data?, errors?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    /// Normalize the envelope into the payload or a single error carrying
    /// the envelope's message.
    pub fn into_result(self) -> Result<Option<T>, AppError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Network(error_message(&self.message)))
        }
    }

    /// Like [`into_result`](Self::into_result) but a successful envelope
    /// without `data` is itself an error.
    pub fn into_data(self) -> Result<T, AppError> {
        let message = self.message.clone();
        self.into_result()?
            .ok_or_else(|| AppError::Network(format!("Response missing data: {}", error_message(&message))))
    }
}

pub(crate) fn error_message(message: &str) -> String {
    if message.trim().is_empty() {
        AppError::DEFAULT_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}
