//! In-memory transport
//!
//! `MemoryTransport` behaves like a single-client broker living in the same
//! process:
//! - `connect`/`disconnect` flip the connection flag and emit the matching
//!   lifecycle event
//! - every subscribe request is acknowledged right away, granting the
//!   requested QoS unless the topic was configured to be rejected
//! - with loopback enabled, publishes on a subscribed topic come back as
//!   `Message` events
//!
//! Every call is recorded so callers can inspect what the feed asked for.
//! `drop_connection` and `restore_connection` simulate the broker side
//! closing and re-opening the link.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::transport::message::{
    EventSender, ProtocolVersion, QoS, RequestId, SubAckCode, Subscription, TransportEvent,
};
use crate::transport::{Transport, TransportConnector};
use crate::utils::error::TransportError;

/// A publish recorded by `MemoryTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

#[derive(Debug, Clone, Default)]
struct MemoryOptions {
    loopback: bool,
    /// Time `connect` takes before the link comes up.
    connect_delay: Option<Duration>,
    /// Topic -> number of upcoming subscribe attempts to refuse.
    rejections: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    endpoint: Option<(String, u16, ProtocolVersion)>,
    credential: Option<(String, Option<String>)>,
    next_request_id: RequestId,
    requests: HashMap<RequestId, Vec<Subscription>>,
    granted: BTreeSet<String>,
    rejections: HashMap<String, usize>,
    subscribe_calls: Vec<Vec<Subscription>>,
    resubscribe_calls: Vec<Subscription>,
    published: Vec<PublishedMessage>,
}

pub struct MemoryTransport {
    client_id: String,
    loopback: bool,
    connect_delay: Option<Duration>,
    events: EventSender,
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// A disconnected transport that reports to `events`.
    pub fn new(client_id: &str, events: EventSender) -> Self {
        Self::with_options(client_id, events, MemoryOptions::default())
    }

    fn with_options(client_id: &str, events: EventSender, options: MemoryOptions) -> Self {
        Self {
            client_id: client_id.to_string(),
            loopback: options.loopback,
            connect_delay: options.connect_delay,
            events,
            state: Mutex::new(MemoryState {
                rejections: options.rejections,
                ..MemoryState::default()
            }),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Refuses the next `times` subscribe attempts for `topic`.
    pub fn reject_topic(&self, topic: &str, times: usize) {
        self.state().rejections.insert(topic.to_string(), times);
    }

    /// Simulates the broker closing the connection.
    pub fn drop_connection(&self, reason: &str) {
        self.state().connected = false;
        self.emit(TransportEvent::Disconnected {
            reason: Some(reason.to_string()),
        });
    }

    /// Simulates the transport re-establishing the connection on its own.
    pub fn restore_connection(&self) {
        self.state().connected = true;
        self.emit(TransportEvent::Connected);
    }

    /// Injects an inbound message as if the broker had routed it here.
    pub fn deliver(&self, topic: &str, payload: Vec<u8>) {
        self.emit(TransportEvent::Message {
            topic: topic.to_string(),
            payload,
            qos: QoS::AtLeastOnce,
        });
    }

    /// Every `subscribe` request, in call order.
    pub fn subscribe_calls(&self) -> Vec<Vec<Subscription>> {
        self.state().subscribe_calls.clone()
    }

    pub fn resubscribe_calls(&self) -> Vec<Subscription> {
        self.state().resubscribe_calls.clone()
    }

    /// Every publish, whether echoed or not.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    pub fn credential(&self) -> Option<(String, Option<String>)> {
        self.state().credential.clone()
    }

    pub fn endpoint(&self) -> Option<(String, u16, ProtocolVersion)> {
        self.state().endpoint.clone()
    }

    /// Topics the fake broker currently considers subscribed.
    pub fn granted_topics(&self) -> BTreeSet<String> {
        self.state().granted.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("{} has no event listener, event dropped", self.client_id);
        }
    }

    fn acknowledge(&self, subscriptions: Vec<Subscription>) -> RequestId {
        let (request_id, codes) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let request_id = state.next_request_id;
            state.next_request_id = state.next_request_id.wrapping_add(1);

            let codes: Vec<SubAckCode> = subscriptions
                .iter()
                .map(|subscription| match state.rejections.get_mut(&subscription.topic) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        SubAckCode::UNSPECIFIED_ERROR
                    }
                    _ => {
                        state.granted.insert(subscription.topic.clone());
                        SubAckCode::granted(subscription.qos)
                    }
                })
                .collect();

            state.requests.insert(request_id, subscriptions);
            (request_id, codes)
        };

        self.emit(TransportEvent::SubscribeAck { request_id, codes });
        request_id
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        version: ProtocolVersion,
    ) -> Result<(), TransportError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut state = self.state();
            state.endpoint = Some((address.to_string(), port, version));
            state.connected = true;
        }
        self.emit(TransportEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state();
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            state.connected = false;
        }
        self.emit(TransportEvent::Disconnected { reason: None });
        Ok(())
    }

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) {
        let echo = {
            let mut state = self.state();
            state.published.push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.clone(),
                qos,
            });
            self.loopback && state.connected && state.granted.contains(topic)
        };

        if echo {
            self.emit(TransportEvent::Message {
                topic: topic.to_string(),
                payload,
                qos,
            });
        }
    }

    fn subscribe(&self, subscriptions: Vec<Subscription>) -> RequestId {
        self.state().subscribe_calls.push(subscriptions.clone());
        self.acknowledge(subscriptions)
    }

    fn resubscribe(&self, subscription: &Subscription) {
        self.state().resubscribe_calls.push(subscription.clone());
        self.acknowledge(vec![subscription.clone()]);
    }

    fn set_auth_credentials(&self, credential: &str, password: Option<&str>) {
        self.state().credential = Some((credential.to_string(), password.map(str::to_string)));
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn subscriptions_by_request_id(&self, request_id: RequestId) -> Vec<Subscription> {
        self.state()
            .requests
            .get(&request_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Opens `MemoryTransport`s and keeps a handle on each of them.
#[derive(Default)]
pub struct MemoryConnector {
    options: MemoryOptions,
    opened: Mutex<Vec<Arc<MemoryTransport>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo publishes back to the client when it subscribes to their topic.
    pub fn with_loopback(mut self) -> Self {
        self.options.loopback = true;
        self
    }

    /// Every transport opened by this connector takes `delay` to connect.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.options.connect_delay = Some(delay);
        self
    }

    /// Every transport opened by this connector refuses the first `times`
    /// subscribe attempts for `topic`.
    pub fn rejecting(mut self, topic: &str, times: usize) -> Self {
        self.options.rejections.insert(topic.to_string(), times);
        self
    }

    /// The most recently opened transport.
    pub fn last(&self) -> Option<Arc<MemoryTransport>> {
        self.opened().last().cloned()
    }

    /// Number of transports opened so far.
    pub fn opened_count(&self) -> usize {
        self.opened().len()
    }

    fn opened(&self) -> MutexGuard<'_, Vec<Arc<MemoryTransport>>> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransportConnector for MemoryConnector {
    fn open(&self, client_id: &str, events: EventSender) -> Arc<dyn Transport> {
        let transport = Arc::new(MemoryTransport::with_options(
            client_id,
            events,
            self.options.clone(),
        ));
        self.opened().push(transport.clone());
        transport
    }
}
