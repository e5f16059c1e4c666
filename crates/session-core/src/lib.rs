//! # warden-session-core
//!
//! Transport-agnostic session lifecycle engine for the Warden security
//! framework: create, track, validate, expire, and terminate sessions
//! independent of how callers reach the server (HTTP, RPC, or direct
//! in-process calls).
//!
//! ## Architecture
//!
//! - [`SessionManager`] orchestrates the whole lifecycle over a pluggable
//!   [`SessionStore`], validating lazily on every access and transparently
//!   auto-recreating invalid sessions when configured to.
//! - [`SessionHandle`] is the client-tier proxy: it delegates every call to
//!   a manager by id and silently absorbs session replacements, so callers
//!   behave as if sessions were never swapped underneath them.
//! - A [`ValidationScheduler`] sweeps all active sessions in the background,
//!   expiring idle ones independent of foreground traffic.
//! - [`SessionListener`]s receive start/stop/expiration notifications as
//!   immutable snapshots, synchronously and in registration order.
//!
//! ## Quick start
//!
//! ```no_run
//! use warden_session_core::{SessionHandle, SessionManagerBuilder};
//!
//! # async fn example() -> warden_session_core::Result<()> {
//! let manager = SessionManagerBuilder::new()
//!     .with_global_timeout_ms(30 * 60 * 1000)
//!     .build();
//!
//! let id = manager.start(Some("203.0.113.7".parse().unwrap())).await?;
//! let handle = SessionHandle::new(manager.clone(), id);
//!
//! handle.set_attribute("user", serde_json::json!("alice")).await?;
//! handle.touch().await?;
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod listener;
pub mod manager;
pub mod scheduler;
pub mod session;
pub mod store;

pub use errors::{Result, SessionError};
pub use listener::{SessionListener, SessionListenerRegistry};
pub use manager::{
    AllowAllHosts, HostPolicy, SessionAccess, SessionConfig, SessionContext, SessionHandle,
    SessionManager, SessionManagerBuilder, DEFAULT_GLOBAL_SESSION_TIMEOUT_MS,
    DEFAULT_SESSION_VALIDATION_INTERVAL_MS,
};
pub use scheduler::{PeriodicValidationScheduler, ValidationScheduler};
pub use session::{
    Session, SessionFactory, SessionId, SessionSnapshot, SimpleSessionFactory,
};
pub use store::{MemorySessionStore, SessionStore};
