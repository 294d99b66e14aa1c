//! The plugin contract.
//!
//! A plugin contributes one capability fragment to the aux bundle and takes
//! part in the invocation lifecycle:
//!
//! | Hook      | When                                         | Runs        |
//! |-----------|----------------------------------------------|-------------|
//! | `create`  | first invocation of a deployment             | once        |
//! | `begin`   | before the handler                           | concurrently|
//! | `end`     | after the handler, also after failures       | concurrently|
//! | `error`   | once per failed phase                        | in order    |
//! | `destroy` | `HandlerFn::shutdown`                        | in order    |
//!
//! Plugin instances are shared by all invocations. Per-request state belongs
//! in [`InvocationSlots`](crate::InvocationSlots), reached through the hook
//! context.
//!
//! # Example
//!
//! ```
//! use hermes_core::{HermesResult, HookContext, Plugin};
//!
//! pub struct Greeting(pub &'static str);
//!
//! struct GreetingPlugin;
//!
//! impl Plugin for GreetingPlugin {
//!     type Aux = Greeting;
//!
//!     fn name(&self) -> &'static str {
//!         "greeting"
//!     }
//!
//!     async fn create(&self) -> HermesResult<Greeting> {
//!         Ok(Greeting("hello"))
//!     }
//!
//!     async fn begin(&self, ctx: &HookContext) -> HermesResult<()> {
//!         tracing::debug!(invocation_id = %ctx.id(), "greeting ready");
//!         Ok(())
//!     }
//! }
//! ```

use crate::context::HookContext;
use crate::error::HermesResult;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A lifecycle participant contributing one capability fragment.
pub trait Plugin: Send + Sync + 'static {
    /// The capability fragment this plugin adds to the aux bundle.
    type Aux: Send + Sync + 'static;

    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Produces the fragment. Called at most once per middleware set.
    fn create(&self) -> impl Future<Output = HermesResult<Self::Aux>> + Send;

    /// Runs before the handler.
    fn begin(&self, ctx: &HookContext) -> impl Future<Output = HermesResult<()>> + Send {
        let _ = ctx;
        async { Ok(()) }
    }

    /// Runs after the handler, whether or not an earlier phase failed.
    fn end(&self, ctx: &HookContext) -> impl Future<Output = HermesResult<()>> + Send {
        let _ = ctx;
        async { Ok(()) }
    }

    /// Runs once for every failed phase, with `ctx.request().last_error()` set.
    ///
    /// A failure here is logged and discarded.
    fn error(&self, ctx: &HookContext) -> impl Future<Output = HermesResult<()>> + Send {
        let _ = ctx;
        async { Ok(()) }
    }

    /// Releases whatever `create` acquired.
    fn destroy(&self) -> impl Future<Output = HermesResult<()>> + Send {
        async { Ok(()) }
    }
}

/// Hooks that run on every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Pre-handler hook.
    Begin,
    /// Post-handler hook.
    End,
    /// Error-recovery hook.
    Error,
}

impl HookKind {
    /// The lifecycle phase this hook runs in.
    pub const fn phase(self) -> Phase {
        match self {
            Self::Begin => Phase::Begin,
            Self::End => Phase::End,
            Self::Error => Phase::Error,
        }
    }
}

/// Lifecycle phases of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Aux bundle resolution.
    Resolve,
    /// `begin` hooks.
    Begin,
    /// The user handler.
    Handler,
    /// `end` hooks.
    End,
    /// `error` hooks.
    Error,
}

impl Phase {
    /// Label used in logs and metrics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Begin => "begin",
            Self::Handler => "handler",
            Self::End => "end",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object-safe view of a plugin's per-invocation hooks.
///
/// Implemented for every [`Plugin`]; the middleware set keeps its plugins as
/// `Arc<dyn PluginHooks>` once the chain is built.
pub trait PluginHooks: Send + Sync + 'static {
    /// The plugin's name.
    fn plugin_name(&self) -> &'static str;

    /// Runs one lifecycle hook.
    fn run_hook<'a>(
        &'a self,
        kind: HookKind,
        ctx: &'a HookContext,
    ) -> BoxFuture<'a, HermesResult<()>>;

    /// Runs the teardown.
    fn run_destroy(&self) -> BoxFuture<'_, HermesResult<()>>;
}

impl<P: Plugin> PluginHooks for P {
    fn plugin_name(&self) -> &'static str {
        self.name()
    }

    fn run_hook<'a>(
        &'a self,
        kind: HookKind,
        ctx: &'a HookContext,
    ) -> BoxFuture<'a, HermesResult<()>> {
        Box::pin(async move {
            match kind {
                HookKind::Begin => self.begin(ctx).await,
                HookKind::End => self.end(ctx).await,
                HookKind::Error => self.error(ctx).await,
            }
        })
    }

    fn run_destroy(&self) -> BoxFuture<'_, HermesResult<()>> {
        Box::pin(self.destroy())
    }
}
