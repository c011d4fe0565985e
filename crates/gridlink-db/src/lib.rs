//! # Gridlink Database Layer
//!
//! The consent ledger: sea-orm entities over PostgreSQL, the SQL-file
//! migration runner, the consent resolver and the guarded-call scope
//! that makes every distributor call leave a durable audit trail.
//!
//! The schema (under `migrations/` at the repository root) is the
//! authoritative place for the ledger invariants; this crate only
//! mirrors them for better error reporting.

pub mod connection;
pub mod entities;
pub mod error;
pub mod guarded_call;
pub mod migration;
pub mod repositories;
pub mod resolver;

pub use connection::establish_connection;
pub use resolver::resolve_consent;
pub use entities::*;
pub use error::{DbError, Result};
pub use guarded_call::{guarded_call, GuardedCall, GuardedCallError, NewCall};

pub use sea_orm::DatabaseConnection;

use chrono::{DateTime, FixedOffset, Utc};

/// Current instant with its local offset attached. Everything the
/// ledger stores is offset-bearing.
pub fn now_local() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}
