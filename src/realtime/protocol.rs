// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime wire codec: Socket.IO v5 packets framed in Engine.IO v4 text
//! frames, carried over a WebSocket.
//!
//! Only the default namespace and text payloads are supported; binary
//! events and acknowledgements are never sent by this client.

use serde::Deserialize;
use serde_json::Value;

/// Engine.IO protocol revision requested in the handshake URL.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Engine.IO `open` payload sent by the server right after the upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `0{...}` transport open
    Open(Handshake),
    /// `1` transport close
    Close,
    /// `2` heartbeat from the server
    Ping,
    /// `3` heartbeat reply
    Pong,
    /// `6`
    Noop,
    /// `40{auth}` namespace connect (client) or `40{sid}` acknowledgement (server)
    Connect(Option<Value>),
    /// `41`
    Disconnect,
    /// `42["name", data]`
    Event { name: String, data: Value },
    /// `44{"message": ...}` namespace connect refused
    ConnectError(String),
}

impl Packet {
    pub fn event(name: &str, data: Value) -> Self {
        Packet::Event {
            name: name.to_string(),
            data,
        }
    }

    /// Encode into a text frame.
    pub fn encode(&self) -> String {
        match self {
            Packet::Open(h) => format!(
                "0{}",
                serde_json::json!({
                    "sid": h.sid,
                    "upgrades": [],
                    "pingInterval": h.ping_interval,
                    "pingTimeout": h.ping_timeout,
                })
            ),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(payload)) => format!("40{}", payload),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, data } => {
                let frame = if data.is_null() {
                    serde_json::json!([name])
                } else {
                    serde_json::json!([name, data])
                };
                format!("42{}", frame)
            }
            Packet::ConnectError(message) => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
        }
    }

    /// Decode a text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();

        match kind {
            '0' => {
                let handshake = serde_json::from_str(rest)
                    .map_err(|e| ProtocolError::Json(format!("open payload: {e}")))?;
                Ok(Packet::Open(handshake))
            }
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '6' => Ok(Packet::Noop),
            '4' => decode_socket_packet(rest),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

fn decode_socket_packet(frame: &str) -> Result<Packet, ProtocolError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let mut body = chars.as_str();

    // Namespace prefix: "/name,"
    if body.starts_with('/') {
        let comma = body
            .find(',')
            .ok_or_else(|| ProtocolError::Malformed(format!("unterminated namespace in {frame:?}")))?;
        let namespace = &body[..comma];
        if namespace != "/" {
            return Err(ProtocolError::Unsupported(format!("namespace {namespace}")));
        }
        body = &body[comma + 1..];
    }

    // Acknowledgement id
    let payload = body.trim_start_matches(|c: char| c.is_ascii_digit());

    match kind {
        '0' => {
            if payload.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                Ok(Packet::Connect(Some(parse_json(payload)?)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let Value::Array(mut items) = parse_json(payload)? else {
                return Err(ProtocolError::Malformed("event payload is not an array".into()));
            };
            if items.is_empty() {
                return Err(ProtocolError::Malformed("event without a name".into()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(ProtocolError::Malformed(format!(
                        "event name is not a string: {other}"
                    )))
                }
            };
            let data = if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            };
            Ok(Packet::Event { name, data })
        }
        '4' => {
            let message = match parse_json(payload)? {
                Value::String(s) => s,
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connection refused")
                    .to_string(),
                other => other.to_string(),
            };
            Ok(Packet::ConnectError(message))
        }
        '3' | '5' | '6' => Err(ProtocolError::Unsupported(format!("socket packet type {kind}"))),
        other => Err(ProtocolError::UnknownType(other)),
    }
}

fn parse_json(raw: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(raw).map_err(|e| ProtocolError::Json(e.to_string()))
}

/// Frame decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown packet type {0:?}")]
    UnknownType(char),

    #[error("invalid JSON payload: {0}")]
    Json(String),

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("unsupported packet: {0}")]
    Unsupported(String),
}
