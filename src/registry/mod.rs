//! The `registry` module maps channel types to broker topics and tracks which
//! topics are subscribed and which callbacks listen on each of them.

pub mod engine;
pub mod topic;

pub use engine::{Registration, SubscriptionRegistry};
pub use topic::{ABSENT_IDENTIFIER, Topic, topic};
