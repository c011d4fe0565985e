//! Ledger entities.

pub mod consent;
pub mod consent_usage_point;
pub mod consent_user;
pub mod subscription;
pub mod subscription_order;
pub mod upstream_order;
pub mod usage_point;
pub mod user;
pub mod webservices_call;

pub use consent::ConsentIssuerType;
pub use subscription::SubscriptionStatus;
pub use upstream_order::SubscriptionCallType;
pub use usage_point::UsagePointSegment;
pub use webservices_call::WebservicesCallStatus;
