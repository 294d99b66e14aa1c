//! Builder and the deployable handler function.

use crate::chain::{Cons, Nil, PluginChain};
use crate::invocation::{Invocation, InvocationReport};
use crate::middleware_set::MiddlewareSet;
use hermes_config::{HermesConfig, Stage};
use hermes_core::{
    Callback, CorsPolicy, Handler, HandlerRequest, HandlerResponse, HermesError, HermesResult,
    Plugin, ResponseEnvelope, SharedError,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Starts a builder with no plugins.
///
/// # Example
///
/// ```rust,ignore
/// use hermes_middleware::build;
///
/// let handler = build()
///     .plugin(DatabasePlugin::new(url))
///     .plugin(LoggerPlugin::new("orders"))
///     .handler(|ctx| async move {
///         let db = ctx.aux().get::<Database, _>();
///         Ok::<_, HermesError>(db.count().await?)
///     });
///
/// handler.call(event, context, callback).await?;
/// ```
#[must_use]
pub fn build() -> Builder<Nil> {
    Builder::new()
}

/// Per-handler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOptions {
    /// Return phase errors to the caller after the response completed.
    pub strict: bool,
    /// Base CORS headers for every response.
    pub cors: CorsPolicy,
}

impl Default for InvocationOptions {
    /// Strict when `STAGE` says `test`.
    fn default() -> Self {
        Self {
            strict: Stage::current().is_test(),
            cors: CorsPolicy::default(),
        }
    }
}

impl From<&HermesConfig> for InvocationOptions {
    fn from(config: &HermesConfig) -> Self {
        Self {
            strict: config.strict(),
            cors: config.middleware.cors.clone(),
        }
    }
}

/// Collects plugins and options, then binds a handler.
pub struct Builder<L> {
    chain: L,
    options: InvocationOptions,
}

impl Builder<Nil> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: Nil,
            options: InvocationOptions::default(),
        }
    }
}

impl Default for Builder<Nil> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: PluginChain> Builder<L> {
    /// Appends a plugin. Later plugins win fragment-type collisions and run
    /// their error hooks later.
    #[must_use]
    pub fn plugin<P: Plugin>(self, plugin: P) -> Builder<Cons<L, P>> {
        Builder {
            chain: Cons::new(self.chain, plugin),
            options: self.options,
        }
    }

    /// Turns strict mode on or off.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Sets the base CORS policy.
    #[must_use]
    pub fn cors(mut self, cors: CorsPolicy) -> Self {
        self.options.cors = cors;
        self
    }

    /// Takes strict mode and CORS from a loaded configuration.
    #[must_use]
    pub fn config(mut self, config: &HermesConfig) -> Self {
        self.options = InvocationOptions::from(config);
        self
    }

    /// Replaces all options.
    #[must_use]
    pub fn options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }

    /// Binds the handler and produces the deployable function.
    pub fn handler<H>(self, handler: H) -> HandlerFn<L, H>
    where
        H: Handler<L::Aux>,
    {
        let set = MiddlewareSet::new(self.chain);
        tracing::debug!(
            plugins = ?set.plugin_names(),
            strict = self.options.strict,
            "handler built"
        );
        HandlerFn {
            inner: Arc::new(Inner {
                set,
                handler,
                options: self.options,
            }),
        }
    }
}

struct Inner<L: PluginChain, H> {
    set: MiddlewareSet<L>,
    handler: H,
    options: InvocationOptions,
}

/// A handler bound to its plugins, callable with the platform signature.
///
/// Cloning is cheap; clones share the plugin set and its resolved bundle.
pub struct HandlerFn<L: PluginChain, H> {
    inner: Arc<Inner<L, H>>,
}

impl<L: PluginChain, H> Clone for HandlerFn<L, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, H> HandlerFn<L, H>
where
    L: PluginChain,
    H: Handler<L::Aux>,
{
    /// Handles one platform event. `callback` receives the response exactly
    /// once.
    ///
    /// # Errors
    ///
    /// Only in strict mode: the first phase error, or the resolution error,
    /// after the response was sent.
    pub async fn call(
        &self,
        event: Value,
        context: Value,
        callback: Callback,
    ) -> Result<(), SharedError> {
        let report = self.run(event, context, callback).await;
        match report.first_error() {
            Some(error) if self.inner.options.strict => Err(error),
            _ => Ok(()),
        }
    }

    /// Like [`call`](Self::call) but hands back the response envelope.
    pub async fn invoke(
        &self,
        event: Value,
        context: Value,
    ) -> Result<ResponseEnvelope, SharedError> {
        let (tx, rx) = oneshot::channel();
        let callback: Callback = Box::new(move |envelope| {
            let _ = tx.send(envelope);
        });
        self.call(event, context, callback).await?;
        rx.await
            .map_err(|_| Arc::new(HermesError::internal("response was never completed")))
    }

    /// Runs one invocation and returns its report regardless of mode.
    pub async fn run(&self, event: Value, context: Value, callback: Callback) -> InvocationReport {
        let request = Arc::new(HandlerRequest::new(event, context));
        let response = Arc::new(HandlerResponse::with_cors(
            callback,
            self.inner.options.cors.clone(),
        ));
        Invocation::new(&self.inner.set, request, response)
            .run(&self.inner.handler)
            .await
    }

    /// Runs every plugin's teardown.
    pub async fn shutdown(&self) -> HermesResult<()> {
        self.inner.set.destroy().await
    }

    /// The plugin set.
    pub fn middleware(&self) -> &MiddlewareSet<L> {
        &self.inner.set
    }

    /// Whether strict mode is on.
    pub fn is_strict(&self) -> bool {
        self.inner.options.strict
    }
}

impl<L: PluginChain, H> fmt::Debug for HandlerFn<L, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn")
            .field("middleware", &self.inner.set)
            .field("options", &self.inner.options)
            .finish()
    }
}
