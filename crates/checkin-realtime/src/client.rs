//! WebSocket realtime client.
//!
//! One socket carries every joined channel. Three background tasks own it:
//! a writer draining the outbound queue, a reader routing inbound frames to
//! channels by topic, and a heartbeat. They are aborted when the last handle
//! to the connection (client or subscription) is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::channel::{ChannelControl, ChannelEvent, ChannelSpec, Subscription};
use crate::error::RealtimeError;
use crate::presence::PresenceState;
use crate::protocol::{
    channel_topic, ChangeEvent, Frame, EVENT_CLOSE, EVENT_ERROR, EVENT_JOIN,
    EVENT_POSTGRES_CHANGES, EVENT_PRESENCE_DIFF, EVENT_PRESENCE_STATE, EVENT_REPLY, PHOENIX_TOPIC,
};
use crate::RealtimeTransport;

struct Route {
    frames: mpsc::UnboundedSender<Frame>,
    join_ref: String,
}

type Routes = Arc<Mutex<HashMap<String, Route>>>;

struct Connection {
    outbound: mpsc::UnboundedSender<Frame>,
    routes: Routes,
    refs: Arc<AtomicU64>,
    access_token: RwLock<Option<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    fn make_ref(&self) -> String {
        next_ref(&self.refs)
    }

    fn send(&self, frame: Frame) -> Result<(), RealtimeError> {
        self.outbound.send(frame).map_err(|_| RealtimeError::Closed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::debug!("Realtime connection dropped");
    }
}

fn next_ref(refs: &AtomicU64) -> String {
    refs.fetch_add(1, Ordering::Relaxed).to_string()
}

/// Handle to a realtime socket. Cheap to clone.
#[derive(Clone)]
pub struct RealtimeClient {
    conn: Arc<Connection>,
}

impl RealtimeClient {
    /// Open the socket and start the heartbeat
    pub async fn connect(
        url: &Url,
        access_token: Option<String>,
        heartbeat: Duration,
    ) -> Result<Self, RealtimeError> {
        let (socket, _) = connect_async(url.as_str()).await?;
        tracing::info!("Connected to realtime at {}", url.host_str().unwrap_or_default());

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let routes: Routes = Arc::default();
        let refs = Arc::new(AtomicU64::new(1));

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Dropping unencodable frame: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let heartbeat_tx = outbound.clone();
        let heartbeat_refs = refs.clone();
        let heartbeat_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if heartbeat_tx.send(Frame::heartbeat(next_ref(&heartbeat_refs))).is_err() {
                    break;
                }
            }
        });

        let reader_routes = routes.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match Frame::from_text(&text) {
                        Ok(frame) => route_frame(&reader_routes, frame),
                        Err(e) => tracing::warn!("Failed to parse realtime frame: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("Realtime server closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Realtime socket error: {}", e);
                        break;
                    }
                }
            }

            let routes = std::mem::take(&mut *reader_routes.lock());
            for (topic, route) in routes {
                let _ = route.frames.send(Frame::new(topic, EVENT_CLOSE, json!({})));
            }
        });

        Ok(Self {
            conn: Arc::new(Connection {
                outbound,
                routes,
                refs,
                access_token: RwLock::new(access_token),
                tasks: vec![writer, heartbeat_task, reader],
            }),
        })
    }

    /// Replace the token sent with joins and push it to joined channels
    pub fn set_access_token(&self, token: Option<String>) {
        *self.conn.access_token.write() = token.clone();

        let Some(token) = token else {
            return;
        };
        let routes = self.conn.routes.lock();
        for (topic, route) in routes.iter() {
            if let Err(e) = self
                .conn
                .send(Frame::access_token(topic, &token, route.join_ref.clone()))
            {
                tracing::debug!("Could not push access token to {}: {}", topic, e);
            }
        }
    }

    /// Number of channels currently joined
    pub fn channel_count(&self) -> usize {
        self.conn.routes.lock().len()
    }
}

#[async_trait]
impl RealtimeTransport for RealtimeClient {
    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RealtimeError> {
        let conn = &self.conn;
        let topic = channel_topic(&spec.name);
        let join_ref = conn.make_ref();

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let route = Route {
            frames: frames_tx.clone(),
            join_ref: join_ref.clone(),
        };
        if conn.routes.lock().insert(topic.clone(), route).is_some() {
            tracing::warn!("Channel {} joined twice; previous subscription replaced", topic);
        }

        let mut payload = json!({ "config": spec.join_config() });
        if let Some(token) = conn.access_token.read().clone() {
            payload["access_token"] = Value::String(token);
        }
        let join = Frame::new(topic.as_str(), EVENT_JOIN, payload)
            .with_ref(join_ref.clone())
            .with_join_ref(join_ref.clone());

        if let Err(e) = conn.send(join) {
            conn.routes.lock().remove(&topic);
            return Err(e);
        }
        tracing::debug!("Joining channel {}", topic);

        let task = tokio::spawn(run_channel(spec, join_ref.clone(), frames_rx, events_tx));
        let control = SocketChannel {
            conn: Arc::clone(conn),
            topic: topic.clone(),
            join_ref,
            route: frames_tx,
            task,
            left: AtomicBool::new(false),
        };

        Ok(Subscription::new(topic, events_rx, Box::new(control)))
    }
}

fn route_frame(routes: &Mutex<HashMap<String, Route>>, frame: Frame) {
    if frame.topic == PHOENIX_TOPIC {
        // Heartbeat replies
        return;
    }

    let routes = routes.lock();
    match routes.get(&frame.topic) {
        Some(route) => {
            let _ = route.frames.send(frame);
        }
        None => tracing::trace!("No channel for topic {}", frame.topic),
    }
}

/// Turn a channel's raw frames into [`ChannelEvent`]s
async fn run_channel(
    spec: ChannelSpec,
    join_ref: String,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut presence = PresenceState::new();

    while let Some(frame) = frames.recv().await {
        let event = match frame.event.as_str() {
            EVENT_REPLY if frame.reference.as_deref() == Some(join_ref.as_str()) => {
                match frame.reply_status() {
                    Some(("ok", _)) => {
                        tracing::info!("Joined channel {}", frame.topic);
                        Some(ChannelEvent::Subscribed)
                    }
                    Some((status, response)) => {
                        tracing::warn!("Join of {} failed: {} {}", frame.topic, status, response);
                        Some(ChannelEvent::Error(format!("join {}: {}", status, response)))
                    }
                    None => None,
                }
            }
            EVENT_POSTGRES_CHANGES => match ChangeEvent::from_payload(&frame.payload) {
                Ok(change) if spec.changes.iter().any(|f| f.matches(&change)) => {
                    Some(ChannelEvent::Change(change))
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Malformed change on {}: {}", frame.topic, e);
                    None
                }
            },
            EVENT_PRESENCE_STATE => {
                presence.sync_state(&frame.payload);
                Some(ChannelEvent::PresenceSync(presence.metas()))
            }
            EVENT_PRESENCE_DIFF => presence
                .sync_diff(&frame.payload)
                .then(|| ChannelEvent::PresenceSync(presence.metas())),
            EVENT_ERROR => Some(ChannelEvent::Error(format!("channel {} errored", frame.topic))),
            EVENT_CLOSE => {
                let _ = events.send(ChannelEvent::Closed);
                break;
            }
            _ => None,
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                break;
            }
        }
    }
}

struct SocketChannel {
    conn: Arc<Connection>,
    topic: String,
    join_ref: String,
    route: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
    left: AtomicBool,
}

impl ChannelControl for SocketChannel {
    fn track(&self, meta: Value) -> Result<(), RealtimeError> {
        self.conn.send(Frame::track(
            &self.topic,
            meta,
            self.conn.make_ref(),
            self.join_ref.clone(),
        ))
    }

    fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }

        let ours = {
            let mut routes = self.conn.routes.lock();
            let ours = routes
                .get(&self.topic)
                .is_some_and(|r| r.frames.same_channel(&self.route));
            if ours {
                routes.remove(&self.topic);
            }
            ours
        };
        self.task.abort();

        // The server tracks one channel per topic; a leave now would close
        // the subscription that replaced this one.
        if !ours {
            tracing::debug!("Channel {} was rejoined; not sending leave", self.topic);
            return;
        }

        let leave = Frame::leave(&self.topic, self.conn.make_ref(), self.join_ref.clone());
        if let Err(e) = self.conn.send(leave) {
            tracing::debug!("Leave of {} not sent: {}", self.topic, e);
        }
    }
}
