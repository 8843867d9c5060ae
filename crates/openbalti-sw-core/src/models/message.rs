use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// Control commands a page can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate a waiting worker without waiting for pages to close
    SkipWaiting,
    /// Reply with the current cache version on the message's reply channel
    GetVersion,
    /// Delete every cache and reload every open page
    ForceUpdate,
    /// Anything else; carries the `type` field (or the raw payload)
    Unknown(String),
}

impl ControlMessage {
    /// Parse a posted payload such as `{"type": "GET_VERSION"}`.
    pub fn from_value(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("SKIP_WAITING") => ControlMessage::SkipWaiting,
            Some("GET_VERSION") => ControlMessage::GetVersion,
            Some("FORCE_UPDATE") => ControlMessage::ForceUpdate,
            Some(other) => ControlMessage::Unknown(other.to_string()),
            None => ControlMessage::Unknown(value.to_string()),
        }
    }

    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        Ok(Self::from_value(&value))
    }

    pub fn type_name(&self) -> &str {
        match self {
            ControlMessage::SkipWaiting => "SKIP_WAITING",
            ControlMessage::GetVersion => "GET_VERSION",
            ControlMessage::ForceUpdate => "FORCE_UPDATE",
            ControlMessage::Unknown(kind) => kind,
        }
    }
}

/// Payload sent back on a message's reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageReply {
    Version { version: String },
}

/// A posted message plus the optional channel to answer it on.
#[derive(Debug)]
pub struct Message {
    pub data: ControlMessage,
    pub reply: Option<oneshot::Sender<MessageReply>>,
}

impl Message {
    pub fn new(data: ControlMessage) -> Self {
        Self { data, reply: None }
    }

    /// Message with a reply channel; the receiver gets at most one reply.
    pub fn with_reply(data: ControlMessage) -> (Self, oneshot::Receiver<MessageReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                data,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Notifications the worker pushes to open clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Worker activated; `timestamp` is milliseconds since the Unix epoch
    SwReady { version: String, timestamp: i64 },
    /// Reload the page at `url`
    Navigate { url: String },
}
