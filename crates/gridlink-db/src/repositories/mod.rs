//! Query layer over the ledger entities.

pub mod orders;
pub mod subscriptions;
pub mod usage_points;
pub mod users;

pub use orders::OrderRepository;
pub use subscriptions::{NotificationCheck, SubscriptionRepository};
pub use usage_points::UsagePointRepository;
pub use users::UserRepository;
