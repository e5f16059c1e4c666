//! In-memory session store
//!
//! Default [`SessionStore`] backed by a shared map. Suitable for single
//! process deployments and tests; anything that must survive a restart
//! should bring its own store implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::{Result, SessionError};
use crate::session::{Session, SessionId};
use crate::store::SessionStore;

/// In-memory [`SessionStore`] implementation.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of records currently held, terminal ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionError::storage(format!(
                "session id [{}] already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        tracing::debug!("created store record for session [{}]", session.id);
        Ok(())
    }

    async fn read(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(SessionError::UnknownSession {
                session_id: session.id.clone(),
            }),
        }
    }

    async fn list_active(&self) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| !s.is_terminal())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_read() {
        let store = MemorySessionStore::new();
        let session = Session::new(None, 1_800_000);

        store.create(&session).await.unwrap();
        let read = store.read(&session.id).await.unwrap().unwrap();
        assert_eq!(read.id, session.id);

        // unknown id reads as absent, not as an error
        assert!(store.read(&SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemorySessionStore::new();
        let session = Session::new(None, 1_800_000);

        store.create(&session).await.unwrap();
        assert!(store.create(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_update_unknown_session() {
        let store = MemorySessionStore::new();
        let session = Session::new(None, 1_800_000);
        match store.update(&session).await {
            Err(SessionError::UnknownSession { session_id }) => {
                assert_eq!(session_id, session.id);
            }
            other => panic!("expected UnknownSession, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_active_excludes_terminal_but_read_keeps_them() {
        let store = MemorySessionStore::new();

        let active = Session::new(None, 1_800_000);
        let mut stopped = Session::new(None, 1_800_000);
        stopped.stop();
        let mut expired = Session::new(None, 1_800_000);
        expired.expire();

        store.create(&active).await.unwrap();
        store.create(&stopped).await.unwrap();
        store.create(&expired).await.unwrap();

        let listed = store.list_active().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);

        // terminal records remain readable so validation can see their state
        assert!(store.read(&stopped.id).await.unwrap().unwrap().is_stopped());
        assert!(store.read(&expired.id).await.unwrap().unwrap().expired);
    }
}
