//! Channel subscriptions: what to join and what comes out of it.

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::RealtimeError;
use crate::protocol::{ChangeEvent, ChangeKind};

/// One `postgres_changes` binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
}

impl ChangeFilter {
    pub fn new(kind: ChangeKind, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            kind,
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn matches(&self, change: &ChangeEvent) -> bool {
        (self.kind == ChangeKind::All || self.kind == change.kind)
            && self.schema == change.schema
            && self.table == change.table
    }
}

/// What to join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub changes: Vec<ChangeFilter>,
    /// Presence key; `None` means the channel does not use presence
    pub presence_key: Option<String>,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
            presence_key: None,
        }
    }

    pub fn on_change(mut self, filter: ChangeFilter) -> Self {
        self.changes.push(filter);
        self
    }

    /// Enable presence; an empty key lets the server assign one
    pub fn with_presence(mut self, key: impl Into<String>) -> Self {
        self.presence_key = Some(key.into());
        self
    }

    /// `config` object of the join payload
    pub fn join_config(&self) -> Value {
        let changes: Vec<Value> = self
            .changes
            .iter()
            .map(|f| json!({ "event": f.kind, "schema": f.schema, "table": f.table }))
            .collect();

        json!({
            "broadcast": { "ack": false, "self": false },
            "presence": { "key": self.presence_key.clone().unwrap_or_default() },
            "postgres_changes": changes,
            "private": false,
        })
    }
}

/// Events delivered to a subscriber, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The join was accepted
    Subscribed,
    Change(ChangeEvent),
    /// Full current presence set after a state or diff
    PresenceSync(Vec<Value>),
    /// The server rejected the join or errored the channel
    Error(String),
    Closed,
}

/// Outbound side of a joined channel.
pub trait ChannelControl: Send + Sync {
    /// Announce this client in the channel's presence set
    fn track(&self, meta: Value) -> Result<(), RealtimeError>;

    /// Leave the channel; must be idempotent
    fn leave(&self);
}

/// A joined channel. Dropping it leaves the channel.
pub struct Subscription {
    topic: String,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    control: Box<dyn ChannelControl>,
}

impl Subscription {
    pub fn new(
        topic: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        control: Box<dyn ChannelControl>,
    ) -> Self {
        Self {
            topic: topic.into(),
            events,
            control,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event; `None` once the channel is gone
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn track(&self, meta: Value) -> Result<(), RealtimeError> {
        self.control.track(meta)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("topic", &self.topic).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::debug!("Leaving channel {}", self.topic);
        self.control.leave();
    }
}
