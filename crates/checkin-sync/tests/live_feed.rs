//! LiveFeed against in-memory store and realtime doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use checkin_auth::{AuthState, Identity};
use checkin_realtime::{
    ChangeEvent, ChannelControl, ChannelEvent, ChannelSpec, RealtimeError, RealtimeTransport,
    Subscription,
};
use checkin_services::{CheckIn, CheckInBackend, CheckInInsert, NewCheckIn, ServiceError};
use checkin_sync::{FeedUpdate, LiveFeed, CHECK_INS_CHANNEL, PRESENCE_CHANNEL};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

// ---- store double ----

#[derive(Default)]
struct MemoryBackend {
    rows: Mutex<Vec<CheckIn>>,
    profiles: Mutex<HashMap<Uuid, String>>,
    fail_reads: Mutex<bool>,
    failed_reads: AtomicUsize,
    inserts: AtomicUsize,
}

impl MemoryBackend {
    fn seed(&self, row: CheckIn) {
        self.rows.lock().insert(0, row);
    }

    fn set_profile(&self, user: Uuid, name: &str) {
        self.profiles.lock().insert(user, name.to_string());
    }

    fn replace_location(&self, id: Uuid, location: &str) {
        if let Some(row) = self.rows.lock().iter_mut().find(|r| r.id == id) {
            row.location = location.to_string();
        }
    }

    fn read_failure(&self) -> Option<ServiceError> {
        if !*self.fail_reads.lock() {
            return None;
        }
        self.failed_reads.fetch_add(1, Ordering::SeqCst);
        Some(fail())
    }
}

fn fail() -> ServiceError {
    ServiceError::Backend {
        status: 500,
        code: None,
        message: "unavailable".to_string(),
    }
}

#[async_trait]
impl CheckInBackend for MemoryBackend {
    async fn recent_check_ins(&self, limit: usize) -> Result<Vec<CheckIn>, ServiceError> {
        if let Some(e) = self.read_failure() {
            return Err(e);
        }
        let mut rows = self.rows.lock().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn check_in_by_id(&self, id: Uuid) -> Result<Option<CheckIn>, ServiceError> {
        if let Some(e) = self.read_failure() {
            return Err(e);
        }
        Ok(self.rows.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, ServiceError> {
        Ok(self.profiles.lock().get(&user_id).cloned())
    }

    async fn insert_check_in(&self, row: &CheckInInsert) -> Result<CheckIn, ServiceError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let today = Utc::now().date_naive();
        let mut rows = self.rows.lock();
        if rows.iter().any(|r| r.user_id == row.user_id && r.check_in_date == today) {
            return Err(ServiceError::Duplicate(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }

        let stored = CheckIn {
            id: Uuid::new_v4(),
            user_id: row.user_id,
            weather_condition: row.weather_condition.clone(),
            temperature: row.temperature,
            location: row.location.clone(),
            mood: row.mood.clone(),
            notes: row.notes.clone(),
            created_at: Utc::now(),
            check_in_date: today,
            display_name: None,
        };
        rows.push(stored.clone());
        Ok(stored)
    }
}

// ---- realtime double ----

#[derive(Default)]
struct MemoryTransport {
    channels: Mutex<HashMap<String, mpsc::UnboundedSender<ChannelEvent>>>,
    tracked: Arc<Mutex<Vec<Value>>>,
    leaves: Arc<AtomicUsize>,
    /// `join:<channel>` / `leave:<channel>` in the order they happened
    log: Arc<Mutex<Vec<String>>>,
}

struct MemoryControl {
    name: String,
    tracked: Arc<Mutex<Vec<Value>>>,
    leaves: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ChannelControl for MemoryControl {
    fn track(&self, meta: Value) -> Result<(), RealtimeError> {
        self.tracked.lock().push(meta);
        Ok(())
    }

    fn leave(&self) {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("leave:{}", self.name));
    }
}

#[async_trait]
impl RealtimeTransport for MemoryTransport {
    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RealtimeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().insert(spec.name.clone(), tx);
        self.log.lock().push(format!("join:{}", spec.name));
        Ok(Subscription::new(
            format!("realtime:{}", spec.name),
            rx,
            Box::new(MemoryControl {
                name: spec.name,
                tracked: self.tracked.clone(),
                leaves: self.leaves.clone(),
                log: self.log.clone(),
            }),
        ))
    }
}

impl MemoryTransport {
    fn is_joined(&self, name: &str) -> bool {
        self.channels
            .lock()
            .get(name)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn history(&self, name: &str) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter(|entry| entry.ends_with(&format!(":{}", name)))
            .map(|entry| entry.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    fn push(&self, name: &str, event: ChannelEvent) {
        let channels = self.channels.lock();
        channels.get(name).unwrap().send(event).unwrap();
    }

    fn push_change(&self, kind: &str, id: Uuid) {
        let change = ChangeEvent::from_payload(&json!({
            "type": kind,
            "schema": "public",
            "table": "check_ins",
            "record": { "id": id.to_string() }
        }))
        .unwrap();
        self.push(CHECK_INS_CHANNEL, ChannelEvent::Change(change));
    }
}

// ---- helpers ----

type Feed = LiveFeed<MemoryBackend, MemoryTransport>;

fn row(user_id: Uuid, location: &str, minutes_ago: i64) -> CheckIn {
    let created_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
    CheckIn {
        id: Uuid::new_v4(),
        user_id,
        weather_condition: "Sunny".to_string(),
        temperature: 24.0,
        location: location.to_string(),
        mood: Some("😊 Happy".to_string()),
        notes: None,
        created_at,
        check_in_date: created_at.date_naive(),
        display_name: None,
    }
}

fn me() -> Identity {
    Identity::new(Uuid::new_v4(), Some("ada@example.com".to_string()))
}

fn setup(limit: usize) -> (Arc<MemoryBackend>, Arc<MemoryTransport>, Feed) {
    let backend = Arc::new(MemoryBackend::default());
    let transport = Arc::new(MemoryTransport::default());
    let feed = LiveFeed::new(backend.clone(), transport.clone(), limit);
    (backend, transport, feed)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

async fn attach_and_load(feed: &Feed, transport: &MemoryTransport, identity: Identity) {
    feed.attach(identity);
    eventually(|| !feed.is_loading()).await;
    assert!(transport.is_joined(CHECK_INS_CHANNEL));
    assert!(transport.is_joined(PRESENCE_CHANNEL));
}

fn presence_meta(user: Uuid, name: &str) -> Value {
    json!({
        "user_id": user.to_string(),
        "display_name": name,
        "online_at": Utc::now().to_rfc3339(),
        "location": "Lagos, Nigeria",
        "phx_ref": Uuid::new_v4().to_string()
    })
}

// ---- tests ----

#[tokio::test]
async fn test_detached_feed_is_loading_and_empty() {
    let (_, transport, feed) = setup(20);
    assert!(feed.is_loading());
    assert!(feed.list_check_ins().is_empty());
    assert!(feed.identity().is_none());
    assert!(!transport.is_joined(CHECK_INS_CHANNEL));
}

#[tokio::test]
async fn test_initial_fetch_with_display_names() {
    let (backend, transport, feed) = setup(20);
    let named = Uuid::new_v4();
    backend.seed(row(named, "Seattle", 30));
    backend.seed(row(Uuid::new_v4(), "Tokyo, Japan", 5));
    backend.set_profile(named, "sunny_sam");

    attach_and_load(&feed, &transport, me()).await;

    let rows = feed.list_check_ins();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].location, "Tokyo, Japan");
    assert_eq!(rows[0].display_name_or_anonymous(), "Anonymous");
    assert_eq!(rows[1].display_name.as_deref(), Some("sunny_sam"));
}

#[tokio::test]
async fn test_fetch_error_resolves_empty() {
    let (backend, transport, feed) = setup(20);
    backend.seed(row(Uuid::new_v4(), "Seattle", 1));
    *backend.fail_reads.lock() = true;

    attach_and_load(&feed, &transport, me()).await;
    assert!(feed.list_check_ins().is_empty());
}

#[tokio::test]
async fn test_insert_event_prepends_and_caps() {
    let (backend, transport, feed) = setup(3);
    for i in 0..3 {
        backend.seed(row(Uuid::new_v4(), "Seattle", 10 + i));
    }
    attach_and_load(&feed, &transport, me()).await;
    let oldest = feed.list_check_ins()[2].id;

    let fresh = row(Uuid::new_v4(), "Abuja, Nigeria", 0);
    backend.seed(fresh.clone());
    transport.push_change("INSERT", fresh.id);

    eventually(|| feed.list_check_ins()[0].id == fresh.id).await;
    let rows = feed.list_check_ins();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.id != oldest));
    assert_eq!(rows[0].display_name.as_deref(), Some("Anonymous"));
}

#[tokio::test]
async fn test_insert_event_below_limit_grows() {
    let (backend, transport, feed) = setup(20);
    backend.seed(row(Uuid::new_v4(), "Seattle", 10));
    attach_and_load(&feed, &transport, me()).await;

    let fresh = row(Uuid::new_v4(), "Dubai, UAE", 0);
    backend.seed(fresh.clone());
    transport.push_change("INSERT", fresh.id);

    eventually(|| feed.list_check_ins().len() == 2).await;
    assert_eq!(feed.list_check_ins()[0].id, fresh.id);
}

#[tokio::test]
async fn test_update_event_replaces_in_place() {
    let (backend, transport, feed) = setup(20);
    let first = row(Uuid::new_v4(), "Seattle", 10);
    let second = row(Uuid::new_v4(), "London, UK", 20);
    backend.seed(first.clone());
    backend.seed(second.clone());
    attach_and_load(&feed, &transport, me()).await;

    backend.replace_location(second.id, "New York");
    transport.push_change("UPDATE", second.id);

    eventually(|| feed.list_check_ins()[1].location == "New York").await;
    let rows = feed.list_check_ins();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, first.id);
    assert_eq!(rows[1].id, second.id);
}

#[tokio::test]
async fn test_events_for_missing_rows_are_dropped() {
    let (backend, transport, feed) = setup(20);
    let listed = row(Uuid::new_v4(), "Seattle", 10);
    backend.seed(listed.clone());
    attach_and_load(&feed, &transport, me()).await;

    // Neither row exists in the store; then one that does, as a marker
    transport.push_change("INSERT", Uuid::new_v4());
    transport.push_change("UPDATE", Uuid::new_v4());
    let marker = row(Uuid::new_v4(), "Lagos, Nigeria", 0);
    backend.seed(marker.clone());
    transport.push_change("INSERT", marker.id);

    eventually(|| feed.list_check_ins().len() == 2).await;
    let ids: Vec<Uuid> = feed.list_check_ins().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![marker.id, listed.id]);
}

#[tokio::test]
async fn test_refetch_errors_drop_the_event() {
    let (backend, transport, feed) = setup(20);
    let listed = row(Uuid::new_v4(), "Seattle", 10);
    backend.seed(listed.clone());
    attach_and_load(&feed, &transport, me()).await;

    *backend.fail_reads.lock() = true;
    let lost = row(Uuid::new_v4(), "Dubai, UAE", 1);
    backend.seed(lost.clone());
    transport.push_change("INSERT", lost.id);
    eventually(|| backend.failed_reads.load(Ordering::SeqCst) == 1).await;
    assert_eq!(feed.list_check_ins().len(), 1);

    // The session is still live once reads recover
    *backend.fail_reads.lock() = false;
    let marker = row(Uuid::new_v4(), "Lagos, Nigeria", 0);
    backend.seed(marker.clone());
    transport.push_change("INSERT", marker.id);

    eventually(|| feed.list_check_ins().len() == 2).await;
    let ids: Vec<Uuid> = feed.list_check_ins().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![marker.id, listed.id]);
    assert!(transport.is_joined(CHECK_INS_CHANNEL));
}

#[tokio::test]
async fn test_presence_excludes_self() {
    let (_, transport, feed) = setup(20);
    let identity = me();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    attach_and_load(&feed, &transport, identity.clone()).await;

    transport.push(
        PRESENCE_CHANNEL,
        ChannelEvent::PresenceSync(vec![
            presence_meta(a, "alice"),
            presence_meta(identity.id, "ada"),
            presence_meta(b, "bob"),
        ]),
    );

    eventually(|| feed.list_online_users().len() == 2).await;
    let mut ids: Vec<Uuid> = feed.list_online_users().iter().map(|p| p.user_id).collect();
    ids.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(ids, expected);

    // A later sync replaces the whole set
    transport.push(PRESENCE_CHANNEL, ChannelEvent::PresenceSync(vec![presence_meta(b, "bob")]));
    eventually(|| feed.list_online_users().len() == 1).await;
    assert_eq!(feed.list_online_users()[0].user_id, b);
}

#[tokio::test]
async fn test_create_requires_identity() {
    let (backend, _, feed) = setup(20);
    let input = NewCheckIn::from_weather(&checkin_weather_snapshot());

    let err = feed.create_check_in(input).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotAuthenticated));
    assert_eq!(backend.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_then_duplicate_same_day() {
    let (backend, transport, feed) = setup(20);
    let identity = me();
    attach_and_load(&feed, &transport, identity.clone()).await;

    let stored = feed
        .create_check_in(NewCheckIn::from_weather(&checkin_weather_snapshot()))
        .await
        .unwrap();
    assert_eq!(stored.user_id, identity.id);
    assert_eq!(stored.location, "Seattle");

    let err = feed
        .create_check_in(NewCheckIn::from_weather(&checkin_weather_snapshot()))
        .await
        .unwrap_err();
    assert!(err.is_duplicate(), "expected duplicate, got {:?}", err);
}

#[tokio::test]
async fn test_long_notes_rejected_before_insert() {
    let (backend, transport, feed) = setup(20);
    attach_and_load(&feed, &transport, me()).await;

    let input = NewCheckIn::from_weather(&checkin_weather_snapshot()).with_notes(Some("☀".repeat(201)));
    let err = feed.create_check_in(input).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(backend.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_update_presence_tracks_identity() {
    let (_, transport, feed) = setup(20);

    feed.update_presence("Tokyo, Japan");
    let identity = me();
    attach_and_load(&feed, &transport, identity.clone()).await;
    feed.update_presence("Tokyo, Japan");

    eventually(|| transport.tracked.lock().len() == 1).await;
    let meta = transport.tracked.lock()[0].clone();
    assert_eq!(meta["user_id"], identity.id.to_string());
    assert_eq!(meta["display_name"], "ada");
    assert_eq!(meta["location"], "Tokyo, Japan");
    assert!(meta["online_at"].is_string());
}

#[tokio::test]
async fn test_detach_releases_and_clears() {
    let (backend, transport, feed) = setup(20);
    backend.seed(row(Uuid::new_v4(), "Seattle", 1));
    attach_and_load(&feed, &transport, me()).await;
    let mut updates = feed.subscribe();

    feed.detach();
    assert_eq!(updates.recv().await.unwrap(), FeedUpdate::Cleared);
    assert!(feed.list_check_ins().is_empty());
    assert!(feed.identity().is_none());

    eventually(|| transport.leaves.load(Ordering::SeqCst) == 2).await;
    assert!(!transport.is_joined(CHECK_INS_CHANNEL));
}

#[tokio::test]
async fn test_drop_releases_subscriptions() {
    let (_, transport, feed) = setup(20);
    attach_and_load(&feed, &transport, me()).await;

    drop(feed);
    eventually(|| transport.leaves.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test]
async fn test_reattach_same_identity_keeps_session() {
    let (_, transport, feed) = setup(20);
    let identity = me();
    attach_and_load(&feed, &transport, identity.clone()).await;

    feed.attach(identity);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.leaves.load(Ordering::SeqCst), 0);
    assert!(!feed.is_loading());
}

#[tokio::test]
async fn test_switching_identity_releases_before_rejoining() {
    let (backend, transport, feed) = setup(20);
    backend.seed(row(Uuid::new_v4(), "Seattle", 1));
    attach_and_load(&feed, &transport, me()).await;

    let other = Identity::new(Uuid::new_v4(), Some("grace@example.com".to_string()));
    feed.attach(other.clone());
    assert_eq!(feed.identity().map(|i| i.id), Some(other.id));
    eventually(|| !feed.is_loading()).await;
    eventually(|| transport.history(PRESENCE_CHANNEL).len() == 3).await;

    for channel in [CHECK_INS_CHANNEL, PRESENCE_CHANNEL] {
        assert_eq!(transport.history(channel), vec!["join", "leave", "join"], "{}", channel);
    }
    assert!(transport.is_joined(CHECK_INS_CHANNEL));
    assert_eq!(feed.list_check_ins().len(), 1);
}

#[tokio::test]
async fn test_detach_then_attach_waits_for_release() {
    let (_, transport, feed) = setup(20);
    attach_and_load(&feed, &transport, me()).await;

    feed.detach();
    feed.attach(me());
    eventually(|| !feed.is_loading()).await;

    assert_eq!(transport.history(CHECK_INS_CHANNEL), vec!["join", "leave", "join"]);
}

#[tokio::test]
async fn test_follow_tracks_identity_changes() {
    let (backend, transport, feed) = setup(20);
    backend.seed(row(Uuid::new_v4(), "Seattle", 1));
    let feed = Arc::new(feed);

    let (auth_tx, auth_rx) = watch::channel(AuthState {
        identity: None,
        loading: true,
    });
    let follower = {
        let feed = feed.clone();
        tokio::spawn(async move { feed.follow(auth_rx).await })
    };

    auth_tx.send_replace(AuthState {
        identity: Some(me()),
        loading: false,
    });
    eventually(|| feed.list_check_ins().len() == 1).await;

    auth_tx.send_replace(AuthState {
        identity: None,
        loading: false,
    });
    eventually(|| feed.identity().is_none()).await;
    assert!(feed.list_check_ins().is_empty());

    drop(auth_tx);
    follower.await.unwrap();
    eventually(|| transport.leaves.load(Ordering::SeqCst) == 2).await;
}

fn checkin_weather_snapshot() -> checkin_weather::WeatherSnapshot {
    checkin_weather::lookup("Seattle")
}
