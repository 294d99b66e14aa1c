//! Statically typed plugin chains.
//!
//! The builder grows a chain one plugin at a time:
//!
//! ```text
//! build()                      Nil
//!     .plugin(a)               Cons<Nil, A>
//!     .plugin(b)               Cons<Cons<Nil, A>, B>
//! ```
//!
//! and the chain's [`PluginChain::Aux`] mirrors it with
//! `AuxLayer<AuxLayer<AuxNil, A::Aux>, B::Aux>`, so handlers get typed access
//! to every fragment.

use crate::guard::guarded;
use futures_util::future::{ready, try_join};
use hermes_core::{
    AuxLayer, AuxNil, BoxFuture, Capabilities, HermesResult, Phase, Plugin, PluginHooks,
};
use std::sync::Arc;

/// The empty chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nil;

/// A chain with one more plugin appended.
pub struct Cons<Init, P> {
    init: Init,
    plugin: Arc<P>,
}

impl<Init, P> Cons<Init, P> {
    pub(crate) fn new(init: Init, plugin: P) -> Self {
        Self {
            init,
            plugin: Arc::new(plugin),
        }
    }
}

/// An ordered list of plugins whose fragments form one bundle.
pub trait PluginChain: Send + Sync + 'static {
    /// The merged bundle.
    type Aux: Capabilities;

    /// Runs every `create` concurrently and merges the fragments in declared
    /// order. The first failure wins; nothing is partially merged.
    fn create_all(&self) -> BoxFuture<'_, HermesResult<Self::Aux>>;

    /// Appends every plugin's hooks in declared order.
    fn collect_hooks(&self, hooks: &mut Vec<Arc<dyn PluginHooks>>);

    /// Number of plugins.
    fn len(&self) -> usize;

    /// Returns `true` for the empty chain.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PluginChain for Nil {
    type Aux = AuxNil;

    fn create_all(&self) -> BoxFuture<'_, HermesResult<AuxNil>> {
        Box::pin(ready(Ok(AuxNil)))
    }

    fn collect_hooks(&self, _hooks: &mut Vec<Arc<dyn PluginHooks>>) {}

    fn len(&self) -> usize {
        0
    }
}

impl<Init, P> PluginChain for Cons<Init, P>
where
    Init: PluginChain,
    P: Plugin,
{
    type Aux = AuxLayer<Init::Aux, P::Aux>;

    fn create_all(&self) -> BoxFuture<'_, HermesResult<Self::Aux>> {
        Box::pin(async move {
            let (init, last) = try_join(self.init.create_all(), create_one(&*self.plugin)).await?;
            Ok(AuxLayer::new(init, last))
        })
    }

    fn collect_hooks(&self, hooks: &mut Vec<Arc<dyn PluginHooks>>) {
        self.init.collect_hooks(hooks);
        let plugin: Arc<dyn PluginHooks> = self.plugin.clone();
        hooks.push(plugin);
    }

    fn len(&self) -> usize {
        self.init.len() + 1
    }
}

async fn create_one<P: Plugin>(plugin: &P) -> HermesResult<P::Aux> {
    tracing::debug!(plugin = plugin.name(), "creating plugin fragment");
    guarded(Phase::Resolve, plugin.create()).await.map_err(|error| {
        tracing::error!(plugin = plugin.name(), error = %error, "plugin initialization failed");
        error
    })
}
