//! Session manager and client-tier handle
//!
//! [`SessionManager`] is the server-side orchestrator: create, access,
//! mutate, stop, and validate sessions. [`SessionHandle`] is the client-tier
//! proxy that delegates every operation to a manager by id and transparently
//! absorbs the session-replacement protocol.

pub mod core;
pub mod handle;

pub use core::{
    AllowAllHosts, HostPolicy, SessionConfig, SessionContext, SessionManager,
    SessionManagerBuilder, DEFAULT_GLOBAL_SESSION_TIMEOUT_MS,
    DEFAULT_SESSION_VALIDATION_INTERVAL_MS,
};
pub use handle::{SessionAccess, SessionHandle};
