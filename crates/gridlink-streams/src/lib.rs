//! # Gridlink Streams
//!
//! The publishing side of the proxy: distributor file drops are
//! decrypted, unpacked, parsed into canonical records, grouped by
//! record name and delivered, throttled, to the subscriptions each
//! record matches.
//!
//! Files never disappear silently: a parsed file is archived, a
//! corrupt or structurally unexpected one is quarantined.

pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod gateway;
pub mod grouping;
pub mod ingest;
pub mod parsers;
pub mod publisher;
pub mod throttle;
pub mod watch;

pub use error::StreamError;
