//! The live feed and its per-identity session.

use std::sync::Arc;

use checkin_auth::{AuthState, Identity};
use checkin_realtime::{
    ChangeEvent, ChangeFilter, ChangeKind, ChannelEvent, ChannelSpec, RealtimeTransport,
    Subscription,
};
use checkin_services::{CheckIn, CheckInBackend, NewCheckIn, ServiceError};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::state::{apply_insert, apply_presence_sync, apply_update, FeedState, UserPresence};

/// Channel carrying row changes of `check_ins`
pub const CHECK_INS_CHANNEL: &str = "check_ins_changes";

/// Presence channel of online users
pub const PRESENCE_CHANNEL: &str = "user_presence";

const UPDATES_CAPACITY: usize = 64;

/// What changed in the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedUpdate {
    /// The bulk fetch resolved
    Loaded,
    CheckIns,
    OnlineUsers,
    /// Identity was lost; the feed is empty again
    Cleared,
}

struct Shared {
    state: RwLock<FeedState>,
    /// Bumped whenever a session starts or ends; writes from an older
    /// session are discarded.
    generation: RwLock<u64>,
    updates: broadcast::Sender<FeedUpdate>,
    limit: usize,
}

impl Shared {
    /// Apply `f` unless `generation` is stale
    fn write_if(&self, generation: u64, update: FeedUpdate, f: impl FnOnce(&mut FeedState)) -> bool {
        {
            let current = self.generation.read();
            if *current != generation {
                return false;
            }
            let mut state = self.state.write();
            f(&mut *state);
        }
        let _ = self.updates.send(update);
        true
    }

    /// Start a new generation with empty state
    fn reset(&self) -> u64 {
        let generation = {
            let mut current = self.generation.write();
            *current += 1;
            *self.state.write() = FeedState::default();
            *current
        };
        let _ = self.updates.send(FeedUpdate::Cleared);
        generation
    }
}

/// Live resources of one attached identity. Dropping it cancels the session
/// task, which releases both subscriptions.
struct FeedSession {
    identity: Identity,
    presence: mpsc::UnboundedSender<Value>,
    task: JoinHandle<()>,
    cancel: DropGuard,
}

impl FeedSession {
    /// Cancel the session and hand back its task so a successor can wait
    /// for the subscriptions to be released.
    fn end(self) -> JoinHandle<()> {
        let Self { task, cancel, .. } = self;
        drop(cancel);
        task
    }
}

#[derive(Default)]
struct Sessions {
    current: Option<FeedSession>,
    /// Task of the last ended session, until a successor has waited on it
    retired: Option<JoinHandle<()>>,
}

/// Recent check-ins and online users, kept current while an identity is
/// attached.
pub struct LiveFeed<B, T> {
    backend: Arc<B>,
    transport: Arc<T>,
    shared: Arc<Shared>,
    sessions: Mutex<Sessions>,
}

impl<B, T> LiveFeed<B, T>
where
    B: CheckInBackend + 'static,
    T: RealtimeTransport + 'static,
{
    /// A detached feed holding at most `limit` check-ins
    pub fn new(backend: Arc<B>, transport: Arc<T>, limit: usize) -> Self {
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);
        Self {
            backend,
            transport,
            shared: Arc::new(Shared {
                state: RwLock::new(FeedState::default()),
                generation: RwLock::new(0),
                updates,
                limit,
            }),
            sessions: Mutex::default(),
        }
    }

    /// Snapshot of the recent check-ins, newest first
    pub fn list_check_ins(&self) -> Vec<CheckIn> {
        self.shared.state.read().check_ins.clone()
    }

    /// Snapshot of the other users online
    pub fn list_online_users(&self) -> Vec<UserPresence> {
        self.shared.state.read().online_users.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.read().loading
    }

    pub fn state(&self) -> FeedState {
        self.shared.state.read().clone()
    }

    /// Notifications of state changes, for renderers
    pub fn subscribe(&self) -> broadcast::Receiver<FeedUpdate> {
        self.shared.updates.subscribe()
    }

    /// The identity the feed is running for
    pub fn identity(&self) -> Option<Identity> {
        self.sessions.lock().current.as_ref().map(|s| s.identity.clone())
    }

    /// Start a session for `identity`: subscribe to row changes and presence,
    /// then load the recent check-ins. Re-attaching the same identity keeps the
    /// running session.
    ///
    /// The new session subscribes only after the previous one has released
    /// its channels.
    pub fn attach(&self, identity: Identity) {
        let mut sessions = self.sessions.lock();
        if sessions.current.as_ref().is_some_and(|s| s.identity.id == identity.id) {
            return;
        }
        let previous = match sessions.current.take() {
            Some(session) => Some(session.end()),
            None => sessions.retired.take(),
        };

        let generation = self.shared.reset();
        let cancel = CancellationToken::new();
        let (presence_tx, presence_rx) = mpsc::unbounded_channel();

        let task = SessionTask {
            backend: self.backend.clone(),
            transport: self.transport.clone(),
            shared: self.shared.clone(),
            identity: identity.clone(),
            generation,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(task.run(previous, presence_rx));

        tracing::info!("Live feed attached for {}", identity.id);
        sessions.current = Some(FeedSession {
            identity,
            presence: presence_tx,
            task,
            cancel: cancel.drop_guard(),
        });
    }

    /// End the session, if any, and clear the feed
    pub fn detach(&self) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.current.take() {
            tracing::info!("Live feed detached for {}", session.identity.id);
            sessions.retired = Some(session.end());
            drop(sessions);
            self.shared.reset();
        }
    }

    /// Attach and detach as the signed-in identity changes. Runs until the
    /// auth provider goes away.
    pub async fn follow(&self, mut auth: watch::Receiver<AuthState>) {
        loop {
            let state = auth.borrow_and_update().clone();
            if !state.loading {
                match state.identity {
                    Some(identity) => self.attach(identity),
                    None => self.detach(),
                }
            }

            if auth.changed().await.is_err() {
                break;
            }
        }
        self.detach();
    }

    /// Insert today's check-in for the attached identity.
    ///
    /// The feed itself is updated by the resulting change event, not here.
    pub async fn create_check_in(&self, check_in: NewCheckIn) -> Result<CheckIn, ServiceError> {
        let identity = self.identity().ok_or(ServiceError::NotAuthenticated)?;
        submit_check_in(self.backend.as_ref(), &identity, check_in).await
    }

    /// Announce the attached user as online at `location`. Best effort; does
    /// nothing without an attached identity.
    pub fn update_presence(&self, location: &str) {
        let sessions = self.sessions.lock();
        let Some(session) = sessions.current.as_ref() else {
            tracing::debug!("Presence update ignored: no identity");
            return;
        };

        match serde_json::to_value(UserPresence::new(&session.identity, location)) {
            Ok(meta) => {
                let _ = session.presence.send(meta);
            }
            Err(e) => tracing::warn!("Could not encode presence: {}", e),
        }
    }
}

impl<B, T> Drop for LiveFeed<B, T> {
    fn drop(&mut self) {
        if self.sessions.get_mut().current.take().is_some() {
            tracing::debug!("Live feed dropped with an attached session");
        }
    }
}

/// Validate and insert today's check-in for `identity`, without a running
/// feed.
pub async fn submit_check_in<B>(
    backend: &B,
    identity: &Identity,
    check_in: NewCheckIn,
) -> Result<CheckIn, ServiceError>
where
    B: CheckInBackend + ?Sized,
{
    let row = check_in.into_insert(identity.id)?;

    match backend.insert_check_in(&row).await {
        Ok(stored) => {
            tracing::info!("Checked in at {} ({})", stored.location, stored.id);
            Ok(stored)
        }
        Err(e) if e.is_duplicate() => {
            tracing::info!("User {} already checked in today", identity.id);
            Err(e)
        }
        Err(e) => {
            tracing::error!("Error creating check-in: {}", e);
            Err(e)
        }
    }
}

fn check_ins_spec() -> ChannelSpec {
    ChannelSpec::new(CHECK_INS_CHANNEL)
        .on_change(ChangeFilter::new(ChangeKind::Insert, "public", "check_ins"))
        .on_change(ChangeFilter::new(ChangeKind::Update, "public", "check_ins"))
}

fn presence_spec(identity: &Identity) -> ChannelSpec {
    ChannelSpec::new(PRESENCE_CHANNEL).with_presence(identity.id.to_string())
}

/// Receive from an optional subscription; pending forever when absent
async fn next_event(subscription: &mut Option<Subscription>) -> Option<ChannelEvent> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// Everything one session needs, moved into its task.
struct SessionTask<B, T> {
    backend: Arc<B>,
    transport: Arc<T>,
    shared: Arc<Shared>,
    identity: Identity,
    generation: u64,
    cancel: CancellationToken,
}

impl<B, T> SessionTask<B, T>
where
    B: CheckInBackend + 'static,
    T: RealtimeTransport + 'static,
{
    async fn run(
        self,
        previous: Option<JoinHandle<()>>,
        mut presence_updates: mpsc::UnboundedReceiver<Value>,
    ) {
        // Channel topics are shared with the previous session; its leaves
        // must reach the server before our joins.
        if let Some(previous) = previous {
            if let Err(e) = previous.await {
                tracing::warn!("Previous feed session ended abnormally: {}", e);
            }
        }
        if self.cancel.is_cancelled() {
            return;
        }

        // Subscribe before the bulk fetch so nothing committed in between is
        // missed; events queue in the subscription until processed.
        let mut changes = self.open(check_ins_spec()).await;
        let mut presence = self.open(presence_spec(&self.identity)).await;

        let initial = tokio::select! {
            _ = self.cancel.cancelled() => return,
            rows = self.initial_fetch() => rows,
        };
        self.shared.write_if(self.generation, FeedUpdate::Loaded, |state| {
            state.check_ins = initial;
            state.loading = false;
        });

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = next_event(&mut changes) => match event {
                    Some(ChannelEvent::Change(change)) => {
                        tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            _ = self.apply_change(&change) => {}
                        }
                    }
                    Some(ChannelEvent::Closed) | None => {
                        tracing::warn!("Check-in channel closed; feed no longer live");
                        changes = None;
                    }
                    Some(ChannelEvent::Error(e)) => tracing::warn!("Check-in channel error: {}", e),
                    Some(_) => {}
                },
                event = next_event(&mut presence) => match event {
                    Some(ChannelEvent::PresenceSync(metas)) => self.apply_presence(metas),
                    Some(ChannelEvent::Closed) | None => {
                        tracing::warn!("Presence channel closed");
                        presence = None;
                    }
                    Some(ChannelEvent::Error(e)) => tracing::warn!("Presence channel error: {}", e),
                    Some(_) => {}
                },
                Some(meta) = presence_updates.recv() => match &presence {
                    Some(sub) => {
                        if let Err(e) = sub.track(meta) {
                            tracing::debug!("Presence track failed: {}", e);
                        }
                    }
                    None => tracing::debug!("Presence update dropped: not joined"),
                },
            }
        }

        tracing::debug!("Feed session for {} ended", self.identity.id);
    }

    async fn open(&self, spec: ChannelSpec) -> Option<Subscription> {
        let name = spec.name.clone();
        match self.transport.subscribe(spec).await {
            Ok(sub) => Some(sub),
            Err(e) => {
                tracing::warn!("Could not subscribe to {}: {}", name, e);
                None
            }
        }
    }

    async fn initial_fetch(&self) -> Vec<CheckIn> {
        match self.backend.recent_check_ins(self.shared.limit).await {
            Ok(rows) => {
                let backend = &self.backend;
                let rows = join_all(rows.into_iter().map(|row| backend.with_display_name(row))).await;
                tracing::info!("Loaded {} recent check-ins", rows.len());
                rows
            }
            Err(e) => {
                tracing::warn!("Failed to load recent check-ins: {}", e);
                Vec::new()
            }
        }
    }

    /// Re-fetch the changed row and merge it
    async fn apply_change(&self, change: &ChangeEvent) {
        let Some(id) = change.record_id().and_then(|id| id.parse::<Uuid>().ok()) else {
            tracing::debug!("Ignoring {:?} event without a row id", change.kind);
            return;
        };

        let row = match self.backend.check_in_by_id(id).await {
            Ok(Some(row)) => self.backend.with_display_name(row).await,
            Ok(None) => {
                tracing::debug!("Check-in {} no longer exists; event dropped", id);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch check-in {}: {}", id, e);
                return;
            }
        };

        let limit = self.shared.limit;
        match change.kind {
            ChangeKind::Insert => {
                self.shared.write_if(self.generation, FeedUpdate::CheckIns, |state| {
                    apply_insert(&mut state.check_ins, row, limit)
                });
            }
            ChangeKind::Update => {
                self.shared.write_if(self.generation, FeedUpdate::CheckIns, |state| {
                    if !apply_update(&mut state.check_ins, row) {
                        tracing::debug!("Updated check-in {} is not in the feed", id);
                    }
                });
            }
            other => tracing::debug!("Ignoring {:?} event for {}", other, id),
        }
    }

    fn apply_presence(&self, metas: Vec<Value>) {
        let members: Vec<UserPresence> = metas
            .into_iter()
            .filter_map(|meta| match serde_json::from_value(meta) {
                Ok(member) => Some(member),
                Err(e) => {
                    tracing::debug!("Skipping malformed presence: {}", e);
                    None
                }
            })
            .collect();

        let online = apply_presence_sync(members, self.identity.id);
        self.shared.write_if(self.generation, FeedUpdate::OnlineUsers, |state| {
            state.online_users = online;
        });
    }
}
