//! # Gridlink Core
//!
//! Domain model shared by every Gridlink crate: measurement records
//! and their metadata, the record identifier grammar, the series
//! catalog and the process-wide configuration document.
//!
//! This crate is transport and storage agnostic; it knows nothing
//! about the database, the distributor bus or the messaging gateway.

pub mod config;
pub mod enedis;
pub mod error;
pub mod gateway;
pub mod identifier;
pub mod metadata;
pub mod record;
pub mod series;
pub mod xml;

pub use error::{CoreError, CoreResult};
pub use identifier::{parse_identifier, record_name, SAMPLE_IDENTIFIER};
pub use metadata::{Metadata, SamplingInterval};
pub use record::{Data, Record};

/// Civil time zone of the distributor bus. Range queries and order
/// windows are reduced to whole days in this zone.
pub const DSO_TZ: chrono_tz::Tz = chrono_tz::Europe::Paris;
