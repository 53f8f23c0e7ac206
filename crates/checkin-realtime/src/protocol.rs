//! Phoenix channel wire format.
//!
//! Every message in either direction is a JSON object with `topic`, `event`,
//! `payload`, `ref` and (for channel messages) `join_ref`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RealtimeError;

pub const PHOENIX_TOPIC: &str = "phoenix";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_ACCESS_TOKEN: &str = "access_token";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_PRESENCE: &str = "presence";
pub const EVENT_PRESENCE_STATE: &str = "presence_state";
pub const EVENT_PRESENCE_DIFF: &str = "presence_diff";

/// Topic for a channel name
pub fn channel_topic(name: &str) -> String {
    format!("realtime:{}", name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl Frame {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference: None,
            join_ref: None,
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_join_ref(mut self, join_ref: impl Into<String>) -> Self {
        self.join_ref = Some(join_ref.into());
        self
    }

    pub fn heartbeat(reference: impl Into<String>) -> Self {
        Self::new(PHOENIX_TOPIC, EVENT_HEARTBEAT, json!({})).with_ref(reference)
    }

    pub fn leave(topic: &str, reference: impl Into<String>, join_ref: impl Into<String>) -> Self {
        Self::new(topic, EVENT_LEAVE, json!({}))
            .with_ref(reference)
            .with_join_ref(join_ref)
    }

    /// Presence `track` with the given metadata
    pub fn track(
        topic: &str,
        meta: Value,
        reference: impl Into<String>,
        join_ref: impl Into<String>,
    ) -> Self {
        Self::new(
            topic,
            EVENT_PRESENCE,
            json!({ "type": "presence", "event": "track", "payload": meta }),
        )
        .with_ref(reference)
        .with_join_ref(join_ref)
    }

    pub fn access_token(topic: &str, token: &str, join_ref: impl Into<String>) -> Self {
        Self::new(topic, EVENT_ACCESS_TOKEN, json!({ "access_token": token })).with_join_ref(join_ref)
    }

    pub fn to_text(&self) -> Result<String, RealtimeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, RealtimeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// `(status, response)` of a `phx_reply`
    pub fn reply_status(&self) -> Option<(&str, &Value)> {
        if self.event != EVENT_REPLY {
            return None;
        }
        let status = self.payload.get("status")?.as_str()?;
        Some((status, self.payload.get("response").unwrap_or(&Value::Null)))
    }
}

/// Kind of row change. `All` is only meaningful in a subscription filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    #[serde(rename = "*")]
    All,
}

/// A row-change notification from a `postgres_changes` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub old_record: Value,
}

impl ChangeEvent {
    /// Parse the payload of a `postgres_changes` frame.
    ///
    /// The change itself sits under `data`; a bare change object is accepted
    /// too.
    pub fn from_payload(payload: &Value) -> Result<Self, RealtimeError> {
        let data = payload.get("data").unwrap_or(payload);
        Ok(Self::deserialize(data)?)
    }

    /// `id` of the changed row, from `old_record` for deletes
    pub fn record_id(&self) -> Option<&str> {
        self.record
            .get("id")
            .or_else(|| self.old_record.get("id"))
            .and_then(Value::as_str)
    }
}
