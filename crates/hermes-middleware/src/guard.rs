//! Panic isolation for hooks, initializers and handlers.

use futures_util::FutureExt;
use hermes_core::{HermesError, HermesResult, Phase};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Awaits `future`, turning a panic into [`HermesError::Panic`].
pub(crate) async fn guarded<T, F>(phase: Phase, future: F) -> HermesResult<T>
where
    F: Future<Output = HermesResult<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HermesError::panic(phase.name(), panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
