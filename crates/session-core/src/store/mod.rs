//! Session persistence boundary
//!
//! The manager speaks to durable (or in-memory) session storage through the
//! narrow [`SessionStore`] contract: create/read/update plus enumeration of
//! the currently active records for the validation sweep.

pub mod memory;

use async_trait::async_trait;

use crate::errors::Result;
use crate::session::{Session, SessionId};

/// Keyed storage for session records.
///
/// Implementations must be safe under concurrent invocation: concurrent
/// create/read/update on distinct ids must not corrupt state, and
/// [`list_active`](SessionStore::list_active) must return a consistent
/// point-in-time snapshot even while other ids are being mutated. The core
/// adds no locking of its own on top of this contract; concurrent writes to
/// the same id resolve last-write-wins at the store's granularity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a newly created session record.
    async fn create(&self, session: &Session) -> Result<()>;

    /// Read a record by id. Terminal (stopped/expired) records are still
    /// returned; validation needs to observe their state.
    async fn read(&self, session_id: &SessionId) -> Result<Option<Session>>;

    /// Persist an updated record.
    async fn update(&self, session: &Session) -> Result<()>;

    /// Point-in-time snapshot of all non-terminal records, for the
    /// validation sweep. May be empty, never fails into a partial view.
    async fn list_active(&self) -> Result<Vec<Session>>;
}

pub use memory::MemorySessionStore;
