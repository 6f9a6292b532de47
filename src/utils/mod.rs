//! The `utils` module provides the pieces shared by every layer of `popfeed`:
//! the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{CredentialError, EnvelopeError, FeedError, Result, TransportError};
