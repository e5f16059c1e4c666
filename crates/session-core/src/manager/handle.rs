//! Client-tier session handle
//!
//! A [`SessionHandle`] is a thin proxy over a manager's operation surface,
//! keyed by a privately held session id. It has no authoritative state of
//! its own: it caches only fields that are immutable server-side once the
//! current id is valid (start timestamp, host) and fetches everything else
//! fresh on every call.
//!
//! Its real job is absorbing the replacement protocol. When the manager
//! auto-recreates a session out from under the handle and signals
//! [`SessionError::ReplacedSession`], the handle permanently rebinds to the
//! new id and recovers per operation, so its own caller never observes the
//! replacement.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::{Result, SessionError};
use crate::manager::{SessionContext, SessionManager};
use crate::session::SessionId;

/// The manager operation surface a handle delegates to.
///
/// [`SessionManager`] implements this for the in-process case; a remoting
/// adapter can implement it over a wire protocol and handles will work
/// unchanged.
#[async_trait]
pub trait SessionAccess: Send + Sync {
    async fn start(&self, host: Option<IpAddr>) -> Result<SessionId>;

    async fn get_start_timestamp(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<DateTime<Utc>>;

    async fn get_last_access_time(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<DateTime<Utc>>;

    async fn get_timeout(&self, ctx: &SessionContext, id: &SessionId) -> Result<i64>;

    async fn set_timeout(&self, ctx: &SessionContext, id: &SessionId, timeout_ms: i64)
        -> Result<()>;

    async fn get_host(&self, ctx: &SessionContext, id: &SessionId) -> Result<Option<IpAddr>>;

    async fn touch(&self, ctx: &SessionContext, id: &SessionId) -> Result<()>;

    async fn stop(&self, ctx: &SessionContext, id: &SessionId) -> Result<()>;

    async fn get_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>>;

    async fn set_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
        value: Value,
    ) -> Result<()>;

    async fn remove_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>>;

    async fn get_attribute_keys(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<Vec<String>>;

    async fn check_valid(&self, ctx: &SessionContext, id: &SessionId) -> Result<()>;
}

#[async_trait]
impl SessionAccess for SessionManager {
    async fn start(&self, host: Option<IpAddr>) -> Result<SessionId> {
        SessionManager::start(self, host).await
    }

    async fn get_start_timestamp(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<DateTime<Utc>> {
        SessionManager::get_start_timestamp(self, ctx, id).await
    }

    async fn get_last_access_time(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<DateTime<Utc>> {
        SessionManager::get_last_access_time(self, ctx, id).await
    }

    async fn get_timeout(&self, ctx: &SessionContext, id: &SessionId) -> Result<i64> {
        SessionManager::get_timeout(self, ctx, id).await
    }

    async fn set_timeout(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        timeout_ms: i64,
    ) -> Result<()> {
        SessionManager::set_timeout(self, ctx, id, timeout_ms).await
    }

    async fn get_host(&self, ctx: &SessionContext, id: &SessionId) -> Result<Option<IpAddr>> {
        SessionManager::get_host(self, ctx, id).await
    }

    async fn touch(&self, ctx: &SessionContext, id: &SessionId) -> Result<()> {
        SessionManager::touch(self, ctx, id).await
    }

    async fn stop(&self, ctx: &SessionContext, id: &SessionId) -> Result<()> {
        SessionManager::stop(self, ctx, id).await
    }

    async fn get_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>> {
        SessionManager::get_attribute(self, ctx, id, key).await
    }

    async fn set_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        SessionManager::set_attribute(self, ctx, id, key, value).await
    }

    async fn remove_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>> {
        SessionManager::remove_attribute(self, ctx, id, key).await
    }

    async fn get_attribute_keys(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<Vec<String>> {
        SessionManager::get_attribute_keys(self, ctx, id).await
    }

    async fn check_valid(&self, ctx: &SessionContext, id: &SessionId) -> Result<()> {
        SessionManager::check_valid(self, ctx, id).await
    }
}

/// Client-tier proxy to a server-side session.
pub struct SessionHandle {
    manager: Arc<dyn SessionAccess>,
    id: RwLock<SessionId>,
    // cached fields, immutable server-side while the current id is valid
    cached_start: RwLock<Option<DateTime<Utc>>>,
    cached_host: RwLock<Option<IpAddr>>,
    ctx: SessionContext,
}

impl SessionHandle {
    pub fn new(manager: Arc<dyn SessionAccess>, id: SessionId) -> Self {
        Self::with_context(manager, id, SessionContext::new())
    }

    /// Create a handle carrying an explicit request context; the context's
    /// host is the fallback binding for auto-recreated replacements.
    pub fn with_context(
        manager: Arc<dyn SessionAccess>,
        id: SessionId,
        ctx: SessionContext,
    ) -> Self {
        Self {
            manager,
            id: RwLock::new(id),
            cached_start: RwLock::new(None),
            cached_host: RwLock::new(None),
            ctx,
        }
    }

    /// The id this handle is currently bound to. May change over the
    /// handle's lifetime as replacements are absorbed.
    pub async fn id(&self) -> SessionId {
        self.id.read().await.clone()
    }

    /// Permanently rebind to a replacement session. The old session's cached
    /// fields no longer apply, so the caches are dropped.
    async fn rebind(&self, new_id: SessionId) {
        tracing::debug!(
            "session handle rebinding from [{}] to replacement [{}]",
            self.id.read().await,
            new_id
        );
        *self.id.write().await = new_id;
        *self.cached_start.write().await = None;
        *self.cached_host.write().await = None;
    }

    pub async fn start_timestamp(&self) -> Result<DateTime<Utc>> {
        if let Some(ts) = *self.cached_start.read().await {
            return Ok(ts);
        }
        let id = self.id().await;
        let ts = match self.manager.get_start_timestamp(&self.ctx, &id).await {
            Ok(ts) => ts,
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                // the replacement's own start timestamp is the right answer
                self.manager.get_start_timestamp(&self.ctx, &new_id).await?
            }
            Err(e) => return Err(e),
        };
        *self.cached_start.write().await = Some(ts);
        Ok(ts)
    }

    /// Always fetched fresh: only the manager knows the authoritative value.
    pub async fn last_access_time(&self) -> Result<DateTime<Utc>> {
        let id = self.id().await;
        match self.manager.get_last_access_time(&self.ctx, &id).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                self.manager.get_last_access_time(&self.ctx, &new_id).await
            }
            other => other,
        }
    }

    pub async fn timeout(&self) -> Result<i64> {
        let id = self.id().await;
        match self.manager.get_timeout(&self.ctx, &id).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                self.manager.get_timeout(&self.ctx, &new_id).await
            }
            other => other,
        }
    }

    pub async fn set_timeout(&self, timeout_ms: i64) -> Result<()> {
        let id = self.id().await;
        match self.manager.set_timeout(&self.ctx, &id, timeout_ms).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                // the caller's intent still applies to the current session
                self.manager.set_timeout(&self.ctx, &new_id, timeout_ms).await
            }
            other => other,
        }
    }

    pub async fn host(&self) -> Result<Option<IpAddr>> {
        if let Some(host) = *self.cached_host.read().await {
            return Ok(Some(host));
        }
        let id = self.id().await;
        let host = match self.manager.get_host(&self.ctx, &id).await {
            Ok(host) => host,
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                self.manager.get_host(&self.ctx, &new_id).await?
            }
            Err(e) => return Err(e),
        };
        if host.is_some() {
            *self.cached_host.write().await = host;
        }
        Ok(host)
    }

    pub async fn touch(&self) -> Result<()> {
        let id = self.id().await;
        match self.manager.touch(&self.ctx, &id).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                // a freshly created session is already touched at creation
                self.rebind(new_id).await;
                Ok(())
            }
            other => other,
        }
    }

    pub async fn stop(&self) -> Result<()> {
        let id = self.id().await;
        match self.manager.stop(&self.ctx, &id).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                // the caller asked to terminate; that applies to the
                // replacement as well
                self.manager.stop(&self.ctx, &new_id).await
            }
            other => other,
        }
    }

    pub async fn attribute(&self, key: &str) -> Result<Option<Value>> {
        let id = self.id().await;
        match self.manager.get_attribute(&self.ctx, &id, key).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                // a new session cannot have the old session's attributes
                self.rebind(new_id).await;
                Ok(None)
            }
            other => other,
        }
    }

    pub async fn attribute_keys(&self) -> Result<Vec<String>> {
        let id = self.id().await;
        match self.manager.get_attribute_keys(&self.ctx, &id).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id).await;
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub async fn set_attribute(&self, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            self.remove_attribute(key).await?;
            return Ok(());
        }
        let id = self.id().await;
        match self
            .manager
            .set_attribute(&self.ctx, &id, key, value.clone())
            .await
        {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                // the caller's intent to persist the attribute still applies
                self.manager
                    .set_attribute(&self.ctx, &new_id, key, value)
                    .await
            }
            other => other,
        }
    }

    pub async fn remove_attribute(&self, key: &str) -> Result<Option<Value>> {
        let id = self.id().await;
        match self.manager.remove_attribute(&self.ctx, &id, key).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id.clone()).await;
                self.manager.remove_attribute(&self.ctx, &new_id, key).await
            }
            other => other,
        }
    }

    /// Whether the session this handle is bound to is currently valid. A
    /// replacement absorbed here leaves the handle bound to a fresh, valid
    /// session, so it reports valid.
    pub async fn is_valid(&self) -> bool {
        self.check_valid().await.is_ok()
    }

    pub async fn check_valid(&self) -> Result<()> {
        let id = self.id().await;
        match self.manager.check_valid(&self.ctx, &id).await {
            Err(SessionError::ReplacedSession { new_id, .. }) => {
                self.rebind(new_id).await;
                Ok(())
            }
            other => other,
        }
    }
}
