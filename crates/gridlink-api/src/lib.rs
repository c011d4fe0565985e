//! # Gridlink API
//!
//! The client-facing side of the proxy: the three execute-command
//! operations (`get_history`, `subscribe`, `unsubscribe`) exposed as
//! two-step form dialogues, the subscription coordinator that keeps
//! upstream collection orders de-duplicated and renewed, and the
//! periodic renewal worker.

pub mod coordinator;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod state;
pub mod workers;

pub use error::ApiError;
pub use state::AppState;
