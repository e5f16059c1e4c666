//! Shared helpers for the integration suites.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use chrono::Duration;
use warden_session_core::{
    MemorySessionStore, SessionId, SessionListener, SessionSnapshot, SessionStore,
};

static TRACING: Once = Once::new();

/// Route sweep/scheduler log output through the test writer when a test
/// wants to inspect it with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A single lifecycle notification observed by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Start(SessionId),
    Stop(SessionId),
    Expiration(SessionId),
}

/// Listener that records every notification it receives, in order.
pub struct RecordingListener {
    events: Mutex<Vec<Notification>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_for(&self, id: &SessionId) -> (usize, usize, usize) {
        let events = self.events.lock().unwrap();
        let starts = events
            .iter()
            .filter(|e| matches!(e, Notification::Start(i) if i == id))
            .count();
        let stops = events
            .iter()
            .filter(|e| matches!(e, Notification::Stop(i) if i == id))
            .count();
        let expirations = events
            .iter()
            .filter(|e| matches!(e, Notification::Expiration(i) if i == id))
            .count();
        (starts, stops, expirations)
    }
}

impl SessionListener for RecordingListener {
    fn on_start(&self, session: &SessionSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(Notification::Start(session.id.clone()));
    }

    fn on_stop(&self, session: &SessionSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(Notification::Stop(session.id.clone()));
    }

    fn on_expiration(&self, session: &SessionSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(Notification::Expiration(session.id.clone()));
    }
}

/// Rewind a stored session's last access time by `idle_ms`, simulating a
/// session that has sat idle that long.
pub async fn backdate_last_access(store: &MemorySessionStore, id: &SessionId, idle_ms: i64) {
    let mut session = store
        .read(id)
        .await
        .expect("store read failed")
        .expect("session must exist to backdate");
    session.last_access_time = session.last_access_time - Duration::milliseconds(idle_ms);
    store.update(&session).await.expect("store update failed");
}
