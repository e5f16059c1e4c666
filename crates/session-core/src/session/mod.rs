//! Session records and construction
//!
//! The authoritative server-side [`Session`] record, the immutable
//! [`SessionSnapshot`] handed to lifecycle listeners, and the
//! [`SessionFactory`] seam used by the manager to mint new records.

pub mod factory;
pub mod session;

pub use factory::{SessionFactory, SimpleSessionFactory};
pub use session::{Session, SessionId, SessionSnapshot};
