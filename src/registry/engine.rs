//! Subscription registry
//!
//! The registry is the observer table of a feed session. It keeps:
//! - the callbacks registered per topic, in registration order
//! - the subscribed-set, i.e. every topic that must be (re)subscribed each
//!   time the transport reports a connection
//!
//! The subscribed-set only grows. There is no unsubscribe path, so a session
//! that keeps registering new identifiers keeps accumulating topics; callers
//! with high topic churn should recreate the session periodically.
//!
//! Concurrency note: the session keeps the registry behind a lock and clones
//! callbacks out of it before awaiting them.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::client::FeedCallback;
use crate::envelope::ChannelType;
use crate::registry::topic::{Topic, topic};

/// Outcome of `SubscriptionRegistry::register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub topic: Topic,
    /// `true` when the topic was not in the subscribed-set before this call
    /// and therefore still needs a subscribe request.
    pub newly_subscribed: bool,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    callbacks: HashMap<Topic, Vec<FeedCallback>>,
    subscribed: BTreeSet<Topic>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the topic derived from `channel_type` and
    /// `identifier`, adding the topic to the subscribed-set if needed.
    pub fn register(
        &mut self,
        channel_type: &ChannelType,
        identifier: Option<&str>,
        callback: FeedCallback,
    ) -> Registration {
        let topic = topic(channel_type, identifier);

        self.callbacks
            .entry(topic.clone())
            .or_default()
            .push(callback);

        let newly_subscribed = self.subscribed.insert(topic.clone());
        Registration {
            topic,
            newly_subscribed,
        }
    }

    /// Callbacks registered for `topic`, in registration order. Unknown
    /// topics resolve to an empty list.
    pub fn resolve(&self, topic: &str) -> Vec<FeedCallback> {
        self.callbacks.get(topic).cloned().unwrap_or_default()
    }

    /// Every topic ever registered, each exactly once.
    pub fn all_subscribed_topics(&self) -> BTreeSet<Topic> {
        self.subscribed.clone()
    }

    /// Whether `topic` is part of the subscribed-set.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscribed.contains(topic)
    }

    /// Number of distinct topics in the subscribed-set.
    pub fn topic_count(&self) -> usize {
        self.subscribed.len()
    }

    /// Number of callbacks registered on `topic`, `0` if unknown.
    pub fn callback_count(&self, topic: &str) -> usize {
        self.callbacks.get(topic).map_or(0, Vec::len)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribed", &self.subscribed)
            .field(
                "callbacks",
                &self
                    .callbacks
                    .iter()
                    .map(|(topic, callbacks)| (topic.as_str(), callbacks.len()))
                    .collect::<HashMap<_, _>>(),
            )
            .finish()
    }
}
