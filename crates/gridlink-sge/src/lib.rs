//! # Gridlink SGE client
//!
//! Typed facade over the distributor's SOAP web-service bus. Four
//! operations are exposed: detailed-measurement history, contractual
//! technical data, collection-order subscription and cancellation.
//!
//! The bus surfaces failures inconsistently (SOAP faults with a
//! vendor code, raw HTTP statuses); everything is normalized to
//! [`SgeError`] so callers can match on the vendor code.

pub mod client;
pub mod error;
pub mod services;
pub mod types;
pub mod xml;

pub use client::SgeClient;
pub use error::SgeError;
pub use services::SgeServices;
pub use types::{SubscribeRequest, TechnicalData};
