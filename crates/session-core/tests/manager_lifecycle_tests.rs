//! Lifecycle tests for the core session manager: start, access, mutation,
//! explicit stop, and the notification protocol.

mod common;

use std::net::IpAddr;
use std::sync::Arc;

use common::{backdate_last_access, Notification, RecordingListener};
use pretty_assertions::assert_eq;
use serde_json::json;
use warden_session_core::{
    HostPolicy, MemorySessionStore, SessionContext, SessionError, SessionId,
    SessionManagerBuilder, SessionStore,
};

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_start_produces_fresh_valid_session() {
    let manager = SessionManagerBuilder::new()
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();

    let id = manager.start(Some(addr("192.0.2.10"))).await.unwrap();
    let session = manager.get_session(&ctx, &id).await.unwrap();

    assert_eq!(session.host, Some(addr("192.0.2.10")));
    assert_eq!(session.last_access_time, session.start_timestamp);
    assert!(!session.is_terminal());
    assert_eq!(session.timeout_ms, 30 * 60 * 1000);
}

#[tokio::test]
async fn test_touch_keeps_session_alive_and_advances_last_access() {
    let manager = SessionManagerBuilder::new()
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();

    let id = manager.start(None).await.unwrap();
    let start = manager.get_start_timestamp(&ctx, &id).await.unwrap();

    manager.touch(&ctx, &id).await.unwrap();

    // well within the default 30-minute timeout
    let session = manager.get_session(&ctx, &id).await.unwrap();
    assert!(session.last_access_time >= start);
    assert!(manager.is_valid(&ctx, &id).await);
}

#[tokio::test]
async fn test_last_access_time_is_the_actual_last_access() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManagerBuilder::new()
        .with_store(store.clone())
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();

    let id = manager.start(None).await.unwrap();
    // make the touch observable without sleeping
    backdate_last_access(&store, &id, 5_000).await;
    let before = manager.get_last_access_time(&ctx, &id).await.unwrap();

    manager.touch(&ctx, &id).await.unwrap();
    let after = manager.get_last_access_time(&ctx, &id).await.unwrap();

    assert!(after > before);
    let start = manager.get_start_timestamp(&ctx, &id).await.unwrap();
    assert!(after > start);
}

#[tokio::test]
async fn test_attribute_roundtrip_and_keys() {
    let manager = SessionManagerBuilder::new()
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();
    let id = manager.start(None).await.unwrap();

    manager
        .set_attribute(&ctx, &id, "user", json!("alice"))
        .await
        .unwrap();
    manager
        .set_attribute(&ctx, &id, "role", json!("admin"))
        .await
        .unwrap();

    assert_eq!(
        manager.get_attribute(&ctx, &id, "user").await.unwrap(),
        Some(json!("alice"))
    );
    let mut keys = manager.get_attribute_keys(&ctx, &id).await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["role".to_string(), "user".to_string()]);

    let removed = manager
        .remove_attribute(&ctx, &id, "role")
        .await
        .unwrap();
    assert_eq!(removed, Some(json!("admin")));
    assert_eq!(
        manager.remove_attribute(&ctx, &id, "role").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_null_attribute_value_is_removal() {
    let manager = SessionManagerBuilder::new()
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();
    let id = manager.start(None).await.unwrap();

    manager
        .set_attribute(&ctx, &id, "user", json!("alice"))
        .await
        .unwrap();
    manager
        .set_attribute(&ctx, &id, "user", json!(null))
        .await
        .unwrap();

    assert_eq!(manager.get_attribute(&ctx, &id, "user").await.unwrap(), None);
    assert!(manager.get_attribute_keys(&ctx, &id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_timeout_overrides_global_default() {
    let manager = SessionManagerBuilder::new()
        .with_global_timeout_ms(60_000)
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();
    let id = manager.start(None).await.unwrap();

    assert_eq!(manager.get_timeout(&ctx, &id).await.unwrap(), 60_000);
    manager.set_timeout(&ctx, &id, -1).await.unwrap();
    assert_eq!(manager.get_timeout(&ctx, &id).await.unwrap(), -1);
}

#[tokio::test]
async fn test_stop_is_terminal_and_notifies_once() {
    let listener = RecordingListener::new();
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManagerBuilder::new()
        .with_store(store.clone())
        .with_listener(listener.clone())
        .with_auto_recreate(false)
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();

    let id = manager.start(None).await.unwrap();
    manager.stop(&ctx, &id).await.unwrap();

    // terminal: any further access fails with the stopped error
    match manager.touch(&ctx, &id).await {
        Err(SessionError::StoppedSession { session_id }) => assert_eq!(session_id, id),
        other => panic!("expected StoppedSession, got {:?}", other),
    }
    assert!(!manager.is_valid(&ctx, &id).await);

    // last access aligned to the stop timestamp, persisted
    let record = store.read(&id).await.unwrap().unwrap();
    assert_eq!(Some(record.last_access_time), record.stop_timestamp);

    // exactly one start, one stop, no expiration (notification exclusivity)
    assert_eq!(listener.count_for(&id), (1, 1, 0));
}

#[tokio::test]
async fn test_expired_session_notifies_expiration_never_stop() {
    let listener = RecordingListener::new();
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManagerBuilder::new()
        .with_store(store.clone())
        .with_listener(listener.clone())
        .with_auto_recreate(false)
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();

    let id = manager.start(None).await.unwrap();
    backdate_last_access(&store, &id, 2_000_000).await;

    match manager.get_session(&ctx, &id).await {
        Err(SessionError::ExpiredSession { session_id }) => assert_eq!(session_id, id),
        other => panic!("expected ExpiredSession, got {:?}", other),
    }

    // re-accessing the already-expired record must not re-notify
    let _ = manager.get_session(&ctx, &id).await;

    assert_eq!(listener.count_for(&id), (1, 0, 1));
    assert!(store.read(&id).await.unwrap().unwrap().expired);
}

#[tokio::test]
async fn test_unknown_session_is_never_auto_recreated() {
    let manager = SessionManagerBuilder::new()
        .with_auto_recreate(true)
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();
    let missing = SessionId::new();

    match manager.get_session(&ctx, &missing).await {
        Err(SessionError::UnknownSession { session_id }) => assert_eq!(session_id, missing),
        other => panic!("expected UnknownSession, got {:?}", other),
    }
}

#[tokio::test]
async fn test_negative_timeout_never_expires() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManagerBuilder::new()
        .with_store(store.clone())
        .with_global_timeout_ms(-1)
        .with_scheduler_enabled(false)
        .build();
    let ctx = SessionContext::new();

    let id = manager.start(None).await.unwrap();
    backdate_last_access(&store, &id, 100_000_000).await;

    assert!(manager.is_valid(&ctx, &id).await);
}

struct DenyAll;

impl HostPolicy for DenyAll {
    fn is_authorized(&self, _host: Option<IpAddr>) -> bool {
        false
    }
}

#[tokio::test]
async fn test_unauthorized_host_cannot_start() {
    let manager = SessionManagerBuilder::new()
        .with_host_policy(Arc::new(DenyAll))
        .with_scheduler_enabled(false)
        .build();

    match manager.start(Some(addr("198.51.100.1"))).await {
        Err(SessionError::HostUnauthorized { host }) => assert_eq!(host, "198.51.100.1"),
        other => panic!("expected HostUnauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_listener_removal_stops_notifications() {
    let listener = RecordingListener::new();
    let manager = SessionManagerBuilder::new()
        .with_scheduler_enabled(false)
        .build();
    let as_listener: Arc<dyn warden_session_core::SessionListener> = listener.clone();
    manager.add_listener(as_listener.clone());

    let first = manager.start(None).await.unwrap();
    assert!(manager.remove_listener(&as_listener));
    let second = manager.start(None).await.unwrap();

    let events = listener.events();
    assert_eq!(events, vec![Notification::Start(first)]);
    let _ = second;
}
