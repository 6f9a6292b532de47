//! Feed session
//!
//! `FeedSession` owns one broker connection at a time and runs a single event
//! loop for it. Every `TransportEvent` is first turned into a `Reaction` by
//! `react`, which only reads session state, and then carried out by `apply`.
//!
//! Lifecycle:
//! - `Idle` -> `Connecting` on `start`
//! - `Connecting`/`Disconnected` -> `Connected` when the transport reports a
//!   connection; the whole subscribed-set is resubscribed at that point
//! - `Connected` -> `Disconnected` when the transport loses the connection
//! - any state -> `Idle` on `stop`
//!
//! The session never reconnects by itself. Reconnection is the transport's
//! job; the session only reacts to the resulting `Connected` event.
//!
//! Callbacks run on the event loop, sequentially. A slow callback delays every
//! later event, and a callback must not await `stop` on its own session.
//! A started session keeps its event loop alive until `stop` is called, even
//! when every handle is dropped.
//!
//! `start` and `stop` are serialized: a `stop` issued while `start` is still
//! connecting waits for it and then tears the new connection down.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::callback::FeedCallback;
use crate::config::Settings;
use crate::credential::CredentialProvider;
use crate::envelope::{ChannelType, Envelope, EnvelopeCodec, MinimumVersion};
use crate::registry::{SubscriptionRegistry, Topic, topic};
use crate::transport::{
    EventReceiver, QoS, Subscription, Transport, TransportConnector, TransportEvent,
};
use crate::utils::error::{FeedError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// What the session does in answer to one transport event.
pub(crate) enum Reaction {
    /// Resubscribe these subscriptions, then enter `Connected`.
    Connected(Vec<Subscription>),
    Disconnected(Option<String>),
    /// Await each callback in order with the envelope.
    Dispatch {
        envelope: Envelope,
        callbacks: Vec<FeedCallback>,
    },
    /// Subscriptions the broker refused, to be requested again one by one.
    Retry(Vec<Subscription>),
    Ignore,
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reaction::Connected(subs) => f.debug_tuple("Connected").field(subs).finish(),
            Reaction::Disconnected(reason) => f.debug_tuple("Disconnected").field(reason).finish(),
            Reaction::Dispatch {
                envelope,
                callbacks,
            } => f
                .debug_struct("Dispatch")
                .field("envelope", envelope)
                .field("callbacks", &callbacks.len())
                .finish(),
            Reaction::Retry(subs) => f.debug_tuple("Retry").field(subs).finish(),
            Reaction::Ignore => f.write_str("Ignore"),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

struct Inner {
    settings: Settings,
    codec: EnvelopeCodec,
    /// Empty means every channel type is accepted.
    channel_types: BTreeSet<ChannelType>,
    registry: Mutex<SubscriptionRegistry>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    worker: Mutex<Option<Worker>>,
    /// Held for the whole of `start` and `stop`.
    lifecycle: tokio::sync::Mutex<()>,
    credential: tokio::sync::Mutex<Option<String>>,
    state: watch::Sender<SessionState>,
    connector: Arc<dyn TransportConnector>,
    credentials: Arc<dyn CredentialProvider>,
}

/// Handle on a feed session. Clones share the same session, so a callback
/// may hold one to `send` replies.
#[derive(Clone)]
pub struct FeedSession {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedSession {
    /// Builds an idle session. Fails when the configured minimum version is
    /// not a valid semantic version.
    pub fn new(
        settings: Settings,
        connector: Arc<dyn TransportConnector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let minimum = MinimumVersion::parse(&settings.feed.minimum_version)?;
        let channel_types = settings
            .feed
            .channel_types
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| ChannelType::new(name.as_str()))
            .collect();
        let (state, _) = watch::channel(SessionState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                codec: EnvelopeCodec::new(minimum),
                channel_types,
                registry: Mutex::new(SubscriptionRegistry::new()),
                transport: Mutex::new(None),
                worker: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
                credential: tokio::sync::Mutex::new(None),
                state,
                connector,
                credentials,
            }),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change from now on.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Settings the session was built with.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Every topic registered so far.
    pub fn subscribed_topics(&self) -> BTreeSet<Topic> {
        lock(&self.inner.registry).all_subscribed_topics()
    }

    /// Fetches the device credential, opens a transport and starts
    /// connecting. The session becomes `Connected` once the transport
    /// reports the connection.
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(FeedError::AlreadyStarted);
        }

        let credential = match self.credential().await {
            Ok(credential) => credential,
            Err(e) => {
                error!("Failed to obtain device credential: {}", e);
                self.inner.state.send_replace(SessionState::Idle);
                return Err(e);
            }
        };

        let broker = &self.inner.settings.broker;
        let client_id = format!("{}-{}", broker.client_id_prefix, Uuid::new_v4());
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = self.inner.connector.open(&client_id, tx);
        transport.set_auth_credentials(&credential, None);

        *lock(&self.inner.transport) = Some(transport.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(self.clone(), transport.clone(), rx, shutdown_rx));
        *lock(&self.inner.worker) = Some(Worker {
            handle,
            shutdown: shutdown_tx,
        });

        info!(
            "{} connecting to {}:{} (protocol {})",
            client_id, broker.host, broker.port, broker.protocol_version
        );
        if let Err(e) = transport
            .connect(&broker.host, broker.port, broker.protocol_version)
            .await
        {
            error!("{} failed to connect: {}", client_id, e);
            lock(&self.inner.transport).take();
            self.shutdown_worker().await;
            self.inner.state.send_replace(SessionState::Idle);
            return Err(e.into());
        }
        Ok(())
    }

    /// Disconnects if connected, then tears down the transport and the event
    /// loop. Safe to call in any state.
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let transport = lock(&self.inner.transport).take();

        let mut outcome = Ok(());
        if let Some(transport) = transport {
            if transport.is_connected() {
                info!("Disconnecting from broker");
                outcome = transport.disconnect().await.map_err(FeedError::from);
            }
        }

        self.shutdown_worker().await;
        self.inner.state.send_replace(SessionState::Idle);
        outcome
    }

    /// Adds `callback` for the topic of `channel_type` and `identifier`.
    ///
    /// A topic seen for the first time is subscribed right away when the
    /// session is `Connected`, otherwise with the resubscribe of the next
    /// connection. Never both.
    pub async fn register_feed_callback(
        &self,
        channel_type: &ChannelType,
        callback: FeedCallback,
        identifier: Option<&str>,
    ) -> Result<Topic> {
        self.validate_channel_type(channel_type)?;

        // The state is read under the registry lock; `apply` flips it to
        // `Connected` under the same lock.
        let (registration, connected) = {
            let mut registry = lock(&self.inner.registry);
            let registration = registry.register(channel_type, identifier, callback);
            (registration, self.state() == SessionState::Connected)
        };
        debug!("Registered callback on {}", registration.topic);

        if registration.newly_subscribed {
            let transport = lock(&self.inner.transport).clone();
            match transport {
                Some(transport) if connected => {
                    transport.subscribe(vec![Subscription::new(
                        registration.topic.as_str(),
                        self.inner.settings.feed.default_qos,
                    )]);
                }
                _ => debug!(
                    "{} queued until the next connection",
                    registration.topic
                ),
            }
        }
        Ok(registration.topic)
    }

    /// Publishes `message` at the configured default QoS.
    pub async fn send(
        &self,
        message: &Value,
        channel_type: &ChannelType,
        identifier: Option<&str>,
    ) -> Result<()> {
        self.send_with_qos(
            message,
            channel_type,
            identifier,
            self.inner.settings.feed.default_qos,
        )
        .await
    }

    /// Publishes `message` at `qos`. Empty values publish nothing.
    pub async fn send_with_qos(
        &self,
        message: &Value,
        channel_type: &ChannelType,
        identifier: Option<&str>,
        qos: QoS,
    ) -> Result<()> {
        self.validate_channel_type(channel_type)?;
        let transport = lock(&self.inner.transport)
            .clone()
            .ok_or(FeedError::NotStarted)?;

        let payload = self.inner.codec.encode(channel_type, message)?;
        let topic = topic(channel_type, identifier);
        if payload.is_empty() {
            debug!("Empty value for {}, nothing published", topic);
            return Ok(());
        }

        transport.publish(topic.as_str(), payload, qos);
        Ok(())
    }

    /// Decides how to answer `event`. Reads the registry and the codec but
    /// changes nothing.
    pub(crate) fn react(&self, event: TransportEvent, transport: &dyn Transport) -> Reaction {
        match event {
            TransportEvent::Connected => {
                let qos = self.inner.settings.feed.default_qos;
                let subscriptions = lock(&self.inner.registry)
                    .all_subscribed_topics()
                    .iter()
                    .map(|topic| Subscription::new(topic.as_str(), qos))
                    .collect();
                Reaction::Connected(subscriptions)
            }
            TransportEvent::Disconnected { reason } => Reaction::Disconnected(reason),
            TransportEvent::Message { topic, payload, .. } => {
                let envelope = match self.inner.codec.decode(&payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        error!("Dropping message on {}: {}", topic, e);
                        return Reaction::Ignore;
                    }
                };
                if let Err(e) = self.inner.codec.check_version(&envelope) {
                    error!("Dropping message on {}: {}", topic, e);
                    return Reaction::Ignore;
                }

                let callbacks = lock(&self.inner.registry).resolve(&topic);
                if callbacks.is_empty() {
                    debug!("No callback registered on {}", topic);
                    return Reaction::Ignore;
                }
                Reaction::Dispatch {
                    envelope,
                    callbacks,
                }
            }
            TransportEvent::SubscribeAck { request_id, codes } => {
                let subscriptions = transport.subscriptions_by_request_id(request_id);
                if subscriptions.len() != codes.len() {
                    warn!(
                        "Subscribe ack {} carries {} codes for {} subscriptions",
                        request_id,
                        codes.len(),
                        subscriptions.len()
                    );
                }

                let mut refused = Vec::new();
                for (subscription, code) in subscriptions.into_iter().zip(codes) {
                    if code.is_error() {
                        warn!(
                            "Subscription to {} refused with {}, retrying",
                            subscription.topic, code
                        );
                        refused.push(subscription);
                    } else {
                        info!("Subscribed to {} (granted {})", subscription.topic, code);
                    }
                }

                if refused.is_empty() {
                    Reaction::Ignore
                } else {
                    Reaction::Retry(refused)
                }
            }
        }
    }

    pub(crate) async fn apply(&self, reaction: Reaction, transport: &dyn Transport) {
        match reaction {
            Reaction::Connected(mut subscriptions) => {
                info!("Connected to broker");
                let registry = lock(&self.inner.registry);
                // Topics registered since `react` took its snapshot.
                let qos = self.inner.settings.feed.default_qos;
                for topic in registry.all_subscribed_topics() {
                    if !subscriptions.iter().any(|s| s.topic == topic.as_str()) {
                        subscriptions.push(Subscription::new(topic.as_str(), qos));
                    }
                }
                if !subscriptions.is_empty() {
                    debug!("Resubscribing {} topics", subscriptions.len());
                    transport.subscribe(subscriptions);
                }
                self.inner.state.send_replace(SessionState::Connected);
                drop(registry);
            }
            Reaction::Disconnected(reason) => {
                match reason {
                    Some(reason) => info!("Disconnected from broker: {}", reason),
                    None => info!("Disconnected from broker"),
                }
                self.inner.state.send_replace(SessionState::Disconnected);
            }
            Reaction::Dispatch {
                envelope,
                callbacks,
            } => {
                for callback in callbacks {
                    if let Err(e) = callback(envelope.clone()).await {
                        error!(
                            "Callback on channel {} failed: {}",
                            envelope.channel_type, e
                        );
                    }
                }
            }
            Reaction::Retry(subscriptions) => {
                for subscription in &subscriptions {
                    transport.resubscribe(subscription);
                }
            }
            Reaction::Ignore => {}
        }
    }

    async fn handle(&self, event: TransportEvent, transport: &dyn Transport) {
        let reaction = self.react(event, transport);
        self.apply(reaction, transport).await;
    }

    async fn credential(&self) -> Result<String> {
        let mut cached = self.inner.credential.lock().await;
        if let Some(credential) = cached.as_ref() {
            return Ok(credential.clone());
        }
        let credential = self.inner.credentials.fetch().await?;
        *cached = Some(credential.clone());
        Ok(credential)
    }

    async fn shutdown_worker(&self) {
        let worker = lock(&self.inner.worker).take();
        if let Some(worker) = worker {
            let _ = worker.shutdown.send(());
            if let Err(e) = worker.handle.await {
                error!("Feed event loop ended abnormally: {}", e);
            }
        }
    }

    fn validate_channel_type(&self, channel_type: &ChannelType) -> Result<()> {
        if self.inner.channel_types.is_empty() || self.inner.channel_types.contains(channel_type) {
            Ok(())
        } else {
            Err(FeedError::UnknownChannelType(channel_type.to_string()))
        }
    }
}

impl fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSession")
            .field("state", &self.state())
            .field("minimum_version", self.inner.codec.minimum_version())
            .field("channel_types", &self.inner.channel_types)
            .field("registry", &*lock(&self.inner.registry))
            .finish()
    }
}

/// Event loop of one started session. Exits on shutdown after handling the
/// events already queued.
async fn run(
    session: FeedSession,
    transport: Arc<dyn Transport>,
    mut events: EventReceiver,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => session.handle(event, transport.as_ref()).await,
                None => break,
            },
        }
    }

    while let Ok(event) = events.try_recv() {
        session.handle(event, transport.as_ref()).await;
    }
    debug!("Feed event loop stopped");
}
