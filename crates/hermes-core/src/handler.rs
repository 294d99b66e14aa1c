//! Handler trait for invocation processing.
//!
//! The [`Handler`] trait is what the builder turns into a deployable
//! function. It is implemented for every async closure or function taking a
//! [`Context`] and returning `Result<impl Serialize, E>` where `E` converts
//! into [`HermesError`], so handlers can use `?` on `anyhow` and `serde_json`
//! errors alike.

use crate::context::Context;
use crate::error::{HermesError, HermesResult};
use serde::Serialize;
use std::future::Future;

/// The user handler of a function.
///
/// The output becomes the success body unless the handler already completed
/// the response itself. Returning `()` yields `{}`.
///
/// # Example
///
/// ```rust,ignore
/// use hermes_core::{Context, HermesResult};
/// use serde_json::{json, Value};
///
/// async fn hello<C>(ctx: Context<C>) -> HermesResult<Value> {
///     let name = ctx.request().query_param("name").unwrap_or("world");
///     Ok(json!({ "hello": name }))
/// }
/// ```
pub trait Handler<C>: Send + Sync + 'static {
    /// Value used as the success body.
    type Output: Serialize + Send;

    /// Handles one invocation.
    fn handle(&self, ctx: Context<C>) -> impl Future<Output = HermesResult<Self::Output>> + Send;
}

impl<C, F, Fut, R, E> Handler<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Serialize + Send,
    E: Into<HermesError>,
{
    type Output = R;

    fn handle(&self, ctx: Context<C>) -> impl Future<Output = HermesResult<R>> + Send {
        let future = self(ctx);
        async move { future.await.map_err(Into::into) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aux::{AuxLayer, AuxNil};
    use crate::context::{InvocationId, InvocationSlots};
    use crate::request::HandlerRequest;
    use crate::response::HandlerResponse;
    use serde_json::{json, Value};
    use std::sync::Arc;

    type Aux = AuxLayer<AuxNil, u32>;

    fn context() -> Context<Aux> {
        Context::new(
            InvocationId::new(),
            Arc::new(HandlerRequest::new(json!({"body": "{\"n\":2}"}), json!({}))),
            Arc::new(HandlerResponse::new(Box::new(|_| {}))),
            Arc::new(AuxLayer::new(AuxNil, 40)),
            Arc::new(InvocationSlots::new()),
        )
    }

    async fn answer(ctx: Context<Aux>) -> HermesResult<Value> {
        let n = ctx.request().body()?["n"].as_u64().unwrap_or_default();
        Ok(json!({ "answer": u64::from(*ctx.aux().get::<u32, _>()) + n }))
    }

    async fn broken(_ctx: Context<Aux>) -> anyhow::Result<()> {
        anyhow::bail!("broken")
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let output = answer.handle(context()).await.unwrap();
        assert_eq!(output, json!({"answer": 42}));
    }

    #[tokio::test]
    async fn test_anyhow_errors_convert() {
        let error = broken.handle(context()).await.unwrap_err();
        assert_eq!(error.message(), "broken");
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let handler = |ctx: Context<Aux>| async move {
            Ok::<_, HermesError>(ctx.request().path().len())
        };
        assert_eq!(handler.handle(context()).await.unwrap(), 0);
    }
}
