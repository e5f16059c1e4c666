//! Session record implementation
//!
//! The server-side session record is the single source of truth for one
//! authenticated interaction context. Validation is part of the record's own
//! contract: every session knows how to classify itself as active, stopped,
//! or idle-expired against a point in time.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, SessionError};

/// Session ID type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoritative server-side session record.
///
/// A session is *terminal* once `stop_timestamp` is set or `expired` is true.
/// Terminal records accept no further mutation through the manager; any
/// attempt fails validation first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier, assigned at creation (primary key)
    pub id: SessionId,

    /// When this session was created
    pub start_timestamp: DateTime<Utc>,

    /// Last time the session was touched or an attribute was mutated.
    /// Monotonically non-decreasing while the session is active.
    pub last_access_time: DateTime<Utc>,

    /// Set once, only on explicit termination
    pub stop_timestamp: Option<DateTime<Utc>>,

    /// Set once, only by validation
    pub expired: bool,

    /// Idle-duration threshold in milliseconds; negative means never expires
    pub timeout_ms: i64,

    /// Originating network address, if known
    pub host: Option<IpAddr>,

    /// Opaque attribute map, mutable while the session is active
    pub attributes: HashMap<String, Value>,
}

impl Session {
    /// Create a new session record starting now, with a fresh unique id.
    pub fn new(host: Option<IpAddr>, timeout_ms: i64) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            start_timestamp: now,
            last_access_time: now,
            stop_timestamp: None,
            expired: false,
            timeout_ms,
            host,
            attributes: HashMap::new(),
        }
    }

    /// Update the last access time to now.
    pub fn touch(&mut self) {
        self.last_access_time = Utc::now();
    }

    /// Mark the session explicitly terminated. Idempotent: the stop
    /// timestamp is only ever set once.
    pub fn stop(&mut self) {
        if self.stop_timestamp.is_none() {
            self.stop_timestamp = Some(Utc::now());
        }
    }

    /// Mark the session expired. Set once, only by validation.
    pub fn expire(&mut self) {
        self.expired = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_timestamp.is_some()
    }

    /// Whether the session counts as expired at `now`: either the expired
    /// flag is already set, or its idle duration exceeds a non-negative
    /// timeout. A negative timeout never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.expired {
            return true;
        }
        if self.timeout_ms < 0 {
            return false;
        }
        now - self.last_access_time > Duration::milliseconds(self.timeout_ms)
    }

    /// Terminal means no further mutation is permitted: stopped or expired.
    pub fn is_terminal(&self) -> bool {
        self.is_stopped() || self.expired
    }

    /// Classify this session against `now`. Stopped wins over expired so a
    /// record never reports both terminal causes.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_stopped() {
            return Err(SessionError::StoppedSession {
                session_id: self.id.clone(),
            });
        }
        if self.is_expired(now) {
            return Err(SessionError::ExpiredSession {
                session_id: self.id.clone(),
            });
        }
        Ok(())
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attribute_keys(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }
}

/// Immutable point-in-time view of a session, handed to lifecycle listeners.
///
/// Listeners receive a detached copy: nothing they do to it can reach the
/// authoritative record.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub start_timestamp: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
    pub stop_timestamp: Option<DateTime<Utc>>,
    pub expired: bool,
    pub timeout_ms: i64,
    pub host: Option<IpAddr>,
    pub attributes: HashMap<String, Value>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            start_timestamp: session.start_timestamp,
            last_access_time: session.last_access_time,
            stop_timestamp: session.stop_timestamp,
            expired: session.expired,
            timeout_ms: session.timeout_ms,
            host: session.host,
            attributes: session.attributes.clone(),
        }
    }
}
