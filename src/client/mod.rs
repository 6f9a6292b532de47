//! The `client` module is the caller-facing side of the feed.
//!
//! `FeedSession` connects through a `Transport`, keeps the subscribed-set
//! alive across reconnects and dispatches decoded envelopes to the
//! `FeedCallback`s registered for their topic.

pub mod callback;
pub mod session;

pub use callback::{CallbackError, CallbackResult, FeedCallback, callback};
pub use session::{FeedSession, SessionState};
