//! The resolved plugin set shared by every invocation of a handler.

use crate::chain::PluginChain;
use hermes_core::{HermesError, HermesResult, PluginHooks, SharedError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A plugin chain plus its lazily created capability bundle.
///
/// The bundle is created on the first invocation and reused afterwards.
/// Concurrent first invocations share one creation. A failed creation is
/// memoized as well: every later invocation sees the same error.
pub struct MiddlewareSet<L: PluginChain> {
    chain: L,
    hooks: Vec<Arc<dyn PluginHooks>>,
    aux: OnceCell<Result<Arc<L::Aux>, SharedError>>,
}

impl<L: PluginChain> MiddlewareSet<L> {
    /// Wraps a chain. Nothing is created until [`resolve`](Self::resolve).
    pub fn new(chain: L) -> Self {
        let mut hooks = Vec::with_capacity(chain.len());
        chain.collect_hooks(&mut hooks);
        Self {
            chain,
            hooks,
            aux: OnceCell::new(),
        }
    }

    /// Returns the bundle, creating it on first use.
    pub async fn resolve(&self) -> Result<Arc<L::Aux>, SharedError> {
        self.aux
            .get_or_init(|| async {
                tracing::debug!(plugins = self.hooks.len(), "resolving capability bundle");
                match self.chain.create_all().await {
                    Ok(aux) => Ok(Arc::new(aux)),
                    Err(error) => {
                        tracing::error!(error = %error, "capability bundle resolution failed");
                        Err(Arc::new(error))
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether resolution has finished, successfully or not.
    pub fn is_resolved(&self) -> bool {
        self.aux.initialized()
    }

    /// Hooks in declared order.
    pub fn hooks(&self) -> &[Arc<dyn PluginHooks>] {
        &self.hooks
    }

    /// Plugin names in declared order.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.plugin_name()).collect()
    }

    /// Runs every plugin's teardown in declared order.
    ///
    /// All teardowns run; the first failure is returned.
    pub async fn destroy(&self) -> HermesResult<()> {
        let mut first: Option<HermesError> = None;
        for hook in &self.hooks {
            if let Err(error) = hook.run_destroy().await {
                tracing::warn!(
                    plugin = hook.plugin_name(),
                    error = %error,
                    "plugin teardown failed"
                );
                first.get_or_insert(error);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<L: PluginChain> fmt::Debug for MiddlewareSet<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareSet")
            .field("plugins", &self.plugin_names())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
