//! The `transport` module describes the broker connection the feed runs on.
//!
//! The feed never speaks a wire protocol itself. It drives an implementation
//! of `Transport` and reacts to the `TransportEvent`s that implementation
//! pushes through an `EventSender`. A `TransportConnector` creates a fresh
//! transport every time a session starts.
//!
//! `memory` provides an in-process loopback implementation used by the
//! tests and the smoke binary.

pub mod memory;
pub mod message;

use std::sync::Arc;

use async_trait::async_trait;

use crate::utils::error::TransportError;

pub use memory::{MemoryConnector, MemoryTransport, PublishedMessage};
pub use message::{
    EventReceiver, EventSender, ProtocolVersion, QoS, RequestId, SubAckCode, Subscription,
    TransportEvent,
};

/// Broker connection used by a feed session.
///
/// `publish`, `subscribe` and `resubscribe` are fire-and-forget: results
/// arrive later as `TransportEvent`s.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        version: ProtocolVersion,
    ) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS);

    /// Sends one subscribe request for all `subscriptions` and returns its id.
    fn subscribe(&self, subscriptions: Vec<Subscription>) -> RequestId;

    fn resubscribe(&self, subscription: &Subscription);

    fn set_auth_credentials(&self, credential: &str, password: Option<&str>);

    fn is_connected(&self) -> bool;

    /// Subscriptions sent with the subscribe request `request_id`, in the
    /// order they were requested.
    fn subscriptions_by_request_id(&self, request_id: RequestId) -> Vec<Subscription>;
}

/// Factory for transports; called once per `FeedSession::start`.
pub trait TransportConnector: Send + Sync {
    fn open(&self, client_id: &str, events: EventSender) -> Arc<dyn Transport>;
}
