//! # PopFeed
//!
//! `popfeed` is a resilient publish/subscribe feed client. Applications send
//! and receive JSON values on named channels; the client wraps them in
//! versioned, compressed envelopes, maps channels to broker topics and keeps
//! every subscription alive across reconnects.
//!
//! ## Core Modules
//!
//! - `client`: `FeedSession`, the caller-facing session and its event loop.
//! - `config`: Loads client configuration from files and the environment.
//! - `credential`: Obtains the device credential used to authenticate.
//! - `envelope`: The wire envelope, its codec and the version gate.
//! - `registry`: Topic mapping and the per-topic callback registry.
//! - `transport`: The broker connection contract and an in-memory transport.
//! - `utils`: Shared utilities such as error types and logging.

pub mod client;
pub mod config;
pub mod credential;
pub mod envelope;
pub mod registry;
pub mod transport;
pub mod utils;

pub use client::{FeedCallback, FeedSession, SessionState, callback};
pub use envelope::{ChannelType, Envelope};
pub use utils::error::{FeedError, Result};
