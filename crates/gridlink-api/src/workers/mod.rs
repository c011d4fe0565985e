//! Background workers.

pub mod renewal;

pub use renewal::RenewalWorker;
