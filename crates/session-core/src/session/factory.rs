//! Session construction seam
//!
//! The manager mints new records through a [`SessionFactory`] so deployments
//! can substitute their own record shape (extra defaults, custom id scheme)
//! without touching the lifecycle logic.

use std::net::IpAddr;

use crate::session::Session;

/// Constructs fresh session records for the manager.
///
/// Implementations must produce a record with a fresh unique id,
/// `start_timestamp` equal to now (and `last_access_time` equal to it),
/// the given originating host, and the given default timeout.
pub trait SessionFactory: Send + Sync {
    fn create_session(&self, host: Option<IpAddr>, timeout_ms: i64) -> Session;
}

/// Default factory producing plain [`Session`] records.
#[derive(Debug, Default)]
pub struct SimpleSessionFactory;

impl SessionFactory for SimpleSessionFactory {
    fn create_session(&self, host: Option<IpAddr>, timeout_ms: i64) -> Session {
        Session::new(host, timeout_ms)
    }
}
