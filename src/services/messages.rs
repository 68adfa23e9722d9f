// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat history and send endpoints (`/messages`).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Message;
use crate::services::api::ApiClient;

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct MessageData {
    message: Message,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    content: &'a str,
    team_id: &'a str,
}

#[derive(Clone)]
pub struct MessageApi {
    api: ApiClient,
}

impl MessageApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /messages?teamId=&limit=`: the most recent `limit` messages, oldest first.
    pub async fn history(&self, team_id: &str, limit: u32) -> Result<Vec<Message>> {
        let list: MessageList = self
            .api
            .get(
                "/messages",
                &[
                    ("teamId", Some(team_id.to_string())),
                    ("limit", Some(limit.to_string())),
                ],
            )
            .await?;
        Ok(list.messages)
    }

    /// `POST /messages`. The backend broadcasts the stored message to the
    /// team room, so the sender sees it arrive as a push.
    pub async fn send(&self, team_id: &str, content: &str) -> Result<Message> {
        let data: MessageData = self
            .api
            .post("/messages", &SendBody { content, team_id })
            .await?;
        Ok(data.message)
    }
}
