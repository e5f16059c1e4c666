//! Core session manager
//!
//! A single concrete manager composed from a store, a factory, a host
//! policy, a listener registry, and a replaceable validation scheduler.
//! Every keyed operation resolves through a validating lookup, so lazy
//! validation (and the auto-recreate policy) applies uniformly.

use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::{Result, SessionError};
use crate::listener::{SessionListener, SessionListenerRegistry};
use crate::scheduler::{PeriodicValidationScheduler, ValidationScheduler};
use crate::session::{Session, SessionFactory, SessionId, SessionSnapshot, SimpleSessionFactory};
use crate::store::{MemorySessionStore, SessionStore};

const MILLIS_PER_MINUTE: i64 = 60 * 1000;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

/// Default idle timeout applied to new sessions: 30 minutes.
pub const DEFAULT_GLOBAL_SESSION_TIMEOUT_MS: i64 = 30 * MILLIS_PER_MINUTE;

/// Default period of the background validation sweep: 1 hour.
pub const DEFAULT_SESSION_VALIDATION_INTERVAL_MS: u64 = MILLIS_PER_HOUR as u64;

/// Manager-wide configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle timeout in milliseconds applied to new sessions; negative means
    /// sessions never expire.
    pub global_timeout_ms: i64,
    /// Period of the background validation sweep, in milliseconds.
    pub validation_interval_ms: u64,
    /// Transparently create a replacement session when an expired or stopped
    /// one is referenced, signalling the caller with
    /// [`SessionError::ReplacedSession`].
    pub auto_recreate: bool,
    /// Whether the validation scheduler is enabled at all. Enablement itself
    /// is lazy, on first session use.
    pub scheduler_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            global_timeout_ms: DEFAULT_GLOBAL_SESSION_TIMEOUT_MS,
            validation_interval_ms: DEFAULT_SESSION_VALIDATION_INTERVAL_MS,
            auto_recreate: true,
            scheduler_enabled: true,
        }
    }
}

/// Policy deciding whether an originating host may start sessions.
///
/// The policy itself (IP allowlists, realm integration, ...) lives outside
/// this crate; this is only its interface boundary.
pub trait HostPolicy: Send + Sync {
    fn is_authorized(&self, host: Option<IpAddr>) -> bool;
}

/// Default policy: every host may start sessions.
#[derive(Debug, Default)]
pub struct AllowAllHosts;

impl HostPolicy for AllowAllHosts {
    fn is_authorized(&self, _host: Option<IpAddr>) -> bool {
        true
    }
}

/// Explicit request-scoped context threaded through keyed operations.
///
/// Carries the caller's originating host so that, when an invalid session is
/// auto-recreated and the invalid record's own host cannot be recovered, the
/// replacement can still be bound to the right address. There is no ambient
/// per-thread fallback; callers that know their host pass it here.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub host: Option<IpAddr>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(host: IpAddr) -> Self {
        Self { host: Some(host) }
    }
}

/// Server-side session lifecycle manager.
///
/// Stateless apart from configuration and the listener list; the store is
/// the single shared mutable resource. All operations are synchronous from
/// the caller's point of view (they complete before returning) and may block
/// only as long as the underlying store does.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    factory: Arc<dyn SessionFactory>,
    host_policy: Arc<dyn HostPolicy>,
    listeners: SessionListenerRegistry,
    config: SessionConfig,
    scheduler: RwLock<Option<Arc<dyn ValidationScheduler>>>,
    weak_self: Weak<SessionManager>,
}

impl SessionManager {
    /// Build a manager with default collaborators (in-memory store, simple
    /// factory, allow-all host policy).
    pub fn new() -> Arc<Self> {
        SessionManagerBuilder::new().build()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Replace the validation scheduler. The default is a
    /// [`PeriodicValidationScheduler`] created lazily on first session use.
    pub async fn set_validation_scheduler(&self, scheduler: Arc<dyn ValidationScheduler>) {
        *self.scheduler.write().await = Some(scheduler);
    }

    pub async fn validation_scheduler(&self) -> Option<Arc<dyn ValidationScheduler>> {
        self.scheduler.read().await.clone()
    }

    /// Start a new session originating from `host`, returning its id.
    ///
    /// Fires `on_start` after the record is persisted.
    pub async fn start(&self, host: Option<IpAddr>) -> Result<SessionId> {
        if !self.host_policy.is_authorized(host) {
            return Err(SessionError::HostUnauthorized {
                host: host
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }
        self.enable_validation_if_necessary().await;

        tracing::trace!("creating session for originating host {:?}", host);
        let session = self
            .factory
            .create_session(host, self.config.global_timeout_ms);
        let id = session.id.clone();
        self.store.create(&session).await?;
        tracing::debug!("started session [{}]", id);
        self.listeners.notify_start(&SessionSnapshot::from(&session));
        Ok(id)
    }

    /// Retrieve a session, validating it first.
    ///
    /// This is the access path every keyed operation goes through; the
    /// returned record is a copy of the store's current state.
    pub async fn get_session(&self, ctx: &SessionContext, id: &SessionId) -> Result<Session> {
        self.lookup(ctx, id).await
    }

    pub async fn get_start_timestamp(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<DateTime<Utc>> {
        Ok(self.lookup(ctx, id).await?.start_timestamp)
    }

    /// Returns the session's actual last access time.
    pub async fn get_last_access_time(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<DateTime<Utc>> {
        Ok(self.lookup(ctx, id).await?.last_access_time)
    }

    pub async fn get_timeout(&self, ctx: &SessionContext, id: &SessionId) -> Result<i64> {
        Ok(self.lookup(ctx, id).await?.timeout_ms)
    }

    pub async fn set_timeout(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        timeout_ms: i64,
    ) -> Result<()> {
        let mut session = self.lookup(ctx, id).await?;
        session.timeout_ms = timeout_ms;
        self.store.update(&session).await
    }

    pub async fn get_host(&self, ctx: &SessionContext, id: &SessionId) -> Result<Option<IpAddr>> {
        Ok(self.lookup(ctx, id).await?.host)
    }

    /// Refresh the session's last access time.
    pub async fn touch(&self, ctx: &SessionContext, id: &SessionId) -> Result<()> {
        let mut session = self.lookup(ctx, id).await?;
        session.touch();
        self.store.update(&session).await
    }

    pub async fn get_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>> {
        Ok(self.lookup(ctx, id).await?.get_attribute(key).cloned())
    }

    /// Bind an attribute value. A null value is equivalent to removal.
    /// Attribute mutation counts as session access.
    pub async fn set_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        if value.is_null() {
            self.remove_attribute(ctx, id, key).await?;
            return Ok(());
        }
        let mut session = self.lookup(ctx, id).await?;
        session.set_attribute(key, value);
        session.touch();
        self.store.update(&session).await
    }

    /// Remove an attribute, returning the removed value if one was bound.
    /// The store is only written when something was actually removed.
    pub async fn remove_attribute(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
        key: &str,
    ) -> Result<Option<Value>> {
        let mut session = self.lookup(ctx, id).await?;
        match session.remove_attribute(key) {
            Some(removed) => {
                session.touch();
                self.store.update(&session).await?;
                Ok(Some(removed))
            }
            None => Ok(None),
        }
    }

    pub async fn get_attribute_keys(
        &self,
        ctx: &SessionContext,
        id: &SessionId,
    ) -> Result<Vec<String>> {
        Ok(self.lookup(ctx, id).await?.attribute_keys())
    }

    /// Explicitly terminate a session: mark it terminal, persist, and fire
    /// `on_stop`. The last access time is aligned to the stop timestamp.
    pub async fn stop(&self, ctx: &SessionContext, id: &SessionId) -> Result<()> {
        let mut session = self.lookup(ctx, id).await?;
        tracing::debug!("stopping session [{}]", session.id);
        session.stop();
        if let Some(stop_ts) = session.stop_timestamp {
            session.last_access_time = stop_ts;
        }
        self.store.update(&session).await?;
        self.listeners.notify_stop(&SessionSnapshot::from(&session));
        Ok(())
    }

    /// Non-throwing validity probe.
    pub async fn is_valid(&self, ctx: &SessionContext, id: &SessionId) -> bool {
        self.check_valid(ctx, id).await.is_ok()
    }

    /// Throwing validity probe: acquiring the session performs validation.
    pub async fn check_valid(&self, ctx: &SessionContext, id: &SessionId) -> Result<()> {
        self.lookup(ctx, id).await.map(|_| ())
    }

    /// Validate every currently active session in the store, expiring the
    /// idle ones. Per-record failures are caught, counted, and logged; the
    /// sweep never aborts early. Records already terminal by the time they
    /// are revisited are skipped without a second notification.
    pub async fn validate_sessions(&self) {
        tracing::info!("validating all active sessions...");

        let active = match self.store.list_active().await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!("unable to enumerate active sessions for validation: {}", e);
                return;
            }
        };

        let mut invalidated = 0usize;
        let now = Utc::now();
        for mut session in active {
            if session.is_terminal() {
                continue;
            }
            // the terminal guard above means validation can only fail here
            // with an idle expiry
            if let Err(e) = session.validate(now) {
                self.expire(&mut session).await;
                tracing::debug!("invalidated session [{}]: {}", session.id, e);
                invalidated += 1;
            }
        }

        if invalidated > 0 {
            tracing::info!(
                "finished session validation. [{}] sessions were stopped.",
                invalidated
            );
        } else {
            tracing::info!("finished session validation. no sessions were stopped.");
        }
    }

    /// Tear down background work. Best-effort and idempotent: scheduler
    /// shutdown errors are swallowed and logged, and destroying a manager
    /// whose scheduler never started is a no-op.
    pub async fn destroy(&self) {
        let scheduler = self.scheduler.write().await.take();
        if let Some(scheduler) = scheduler {
            scheduler.disable().await;
            tracing::info!("disabled session validation scheduler");
        }
    }

    /// Validating lookup behind every keyed operation.
    ///
    /// Unknown ids fail plainly; there is no host context to recover, so
    /// they are never auto-recreated. An expired or stopped session, with
    /// auto-recreate enabled, is replaced by a brand-new one bound to the
    /// invalid record's host (falling back to the context's host) and the
    /// caller is signalled with `ReplacedSession { old_id, new_id }`.
    async fn lookup(&self, ctx: &SessionContext, id: &SessionId) -> Result<Session> {
        self.enable_validation_if_necessary().await;

        tracing::trace!("attempting to retrieve session [{}]", id);
        let session = self.store.read(id).await?.ok_or_else(|| {
            SessionError::UnknownSession {
                session_id: id.clone(),
            }
        })?;
        // retain the host before validation in case the session is invalid
        // and a replacement has to be bound to it
        let host = session.host;

        match self.validate_on_access(session).await {
            Ok(session) => Ok(session),
            Err(err) if err.is_terminal() && self.config.auto_recreate => {
                let host = host.or(ctx.host);
                let new_id = self.start(host).await?;
                tracing::debug!(
                    "session [{}] is invalid; auto-created replacement session [{}]",
                    id,
                    new_id
                );
                Err(SessionError::ReplacedSession {
                    old_id: id.clone(),
                    new_id,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Validate a freshly read record. On idle expiry the terminal state is
    /// persisted and `on_expiration` fired, exactly once per session; a
    /// stopped record fails without re-notification (its `on_stop` already
    /// fired when it was stopped).
    async fn validate_on_access(&self, mut session: Session) -> Result<Session> {
        match session.validate(Utc::now()) {
            Ok(()) => Ok(session),
            Err(err @ SessionError::ExpiredSession { .. }) => {
                self.expire(&mut session).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Persist the expiration transition and notify listeners, guarding the
    /// false-to-true flag transition so `on_expiration` fires at most once.
    async fn expire(&self, session: &mut Session) {
        if session.expired {
            return;
        }
        session.expire();
        if let Err(e) = self.store.update(session).await {
            tracing::warn!(
                "failed to persist expiration of session [{}]: {}",
                session.id,
                e
            );
        }
        self.listeners
            .notify_expiration(&SessionSnapshot::from(&*session));
    }

    /// Lazily enable the validation scheduler, creating the default periodic
    /// one if none was supplied.
    async fn enable_validation_if_necessary(&self) {
        if !self.config.scheduler_enabled {
            return;
        }
        {
            let scheduler = self.scheduler.read().await;
            if let Some(scheduler) = scheduler.as_ref() {
                if scheduler.is_enabled().await {
                    return;
                }
            }
        }
        let mut guard = self.scheduler.write().await;
        let scheduler = match guard.take() {
            Some(scheduler) => scheduler,
            None => {
                tracing::debug!("no validation scheduler set, creating default instance");
                Arc::new(PeriodicValidationScheduler::new(
                    self.weak_self.clone(),
                    Duration::from_millis(self.config.validation_interval_ms),
                )) as Arc<dyn ValidationScheduler>
            }
        };
        if !scheduler.is_enabled().await {
            tracing::info!("enabling session validation scheduler...");
            scheduler.enable().await;
        }
        *guard = Some(scheduler);
    }
}

/// Builder for [`SessionManager`] (collaborators default to the in-memory
/// store, the simple factory, and an allow-all host policy).
pub struct SessionManagerBuilder {
    store: Option<Arc<dyn SessionStore>>,
    factory: Option<Arc<dyn SessionFactory>>,
    host_policy: Option<Arc<dyn HostPolicy>>,
    listeners: Vec<Arc<dyn SessionListener>>,
    config: SessionConfig,
}

impl SessionManagerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            factory: None,
            host_policy: None,
            listeners: Vec::new(),
            config: SessionConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_host_policy(mut self, policy: Arc<dyn HostPolicy>) -> Self {
        self.host_policy = Some(policy);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Idle timeout in milliseconds applied to new sessions; negative means
    /// never expire.
    pub fn with_global_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.config.global_timeout_ms = timeout_ms;
        self
    }

    pub fn with_validation_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.validation_interval_ms = interval_ms;
        self
    }

    pub fn with_auto_recreate(mut self, auto_recreate: bool) -> Self {
        self.config.auto_recreate = auto_recreate;
        self
    }

    pub fn with_scheduler_enabled(mut self, enabled: bool) -> Self {
        self.config.scheduler_enabled = enabled;
        self
    }

    pub fn build(self) -> Arc<SessionManager> {
        let listeners = SessionListenerRegistry::new();
        for listener in self.listeners {
            listeners.add(listener);
        }
        Arc::new_cyclic(|weak| SessionManager {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(SimpleSessionFactory)),
            host_policy: self
                .host_policy
                .unwrap_or_else(|| Arc::new(AllowAllHosts)),
            listeners,
            config: self.config,
            scheduler: RwLock::new(None),
            weak_self: weak.clone(),
        })
    }
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
