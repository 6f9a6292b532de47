//! Feed callbacks
//!
//! A callback receives every decoded envelope delivered on the topic it was
//! registered for. Callbacks are async and awaited one at a time.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::envelope::Envelope;

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

pub type CallbackResult = Result<(), CallbackError>;

/// Shared, type-erased async callback.
pub type FeedCallback = Arc<dyn Fn(Envelope) -> BoxFuture<'static, CallbackResult> + Send + Sync>;

/// Wraps an async closure into a `FeedCallback`.
///
/// ```rust
/// use popfeed::client::callback;
///
/// let on_price = callback(|envelope| async move {
///     println!("price update: {}", envelope.value);
///     Ok(())
/// });
/// # let _ = on_price;
/// ```
pub fn callback<F, Fut>(f: F) -> FeedCallback
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult> + Send + 'static,
{
    Arc::new(move |envelope| f(envelope).boxed())
}
