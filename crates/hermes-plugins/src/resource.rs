//! Generic adapter for store clients and other long-lived resources.
//!
//! ```rust,ignore
//! let db = ResourcePlugin::new("mysql", || async {
//!     Pool::connect(&url).await.map_err(HermesError::from)
//! })
//! .with_teardown(|pool| async move { pool.close().await; Ok(()) });
//! ```
//!
//! The handler reaches the client as `ctx.aux().get::<Resource<Pool>, _>()`.

use hermes_core::{BoxFuture, HermesResult, Plugin};
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// A shared handle to a created resource.
#[derive(Debug)]
pub struct Resource<R>(Arc<R>);

impl<R> Resource<R> {
    /// The shared handle.
    pub fn handle(&self) -> Arc<R> {
        Arc::clone(&self.0)
    }
}

impl<R> Clone for Resource<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R> Deref for Resource<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.0
    }
}

type Factory<R> = Box<dyn Fn() -> BoxFuture<'static, HermesResult<R>> + Send + Sync>;
type Teardown<R> = Box<dyn Fn(Arc<R>) -> BoxFuture<'static, HermesResult<()>> + Send + Sync>;

/// Builds a resource once per deployment and tears it down on shutdown.
pub struct ResourcePlugin<R> {
    name: &'static str,
    factory: Factory<R>,
    teardown: Option<Teardown<R>>,
    created: OnceLock<Arc<R>>,
}

impl<R: Send + Sync + 'static> ResourcePlugin<R> {
    /// Creates the plugin from an async factory.
    pub fn new<F, Fut>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HermesResult<R>> + Send + 'static,
    {
        Self {
            name,
            factory: Box::new(move || Box::pin(factory())),
            teardown: None,
            created: OnceLock::new(),
        }
    }

    /// Runs `teardown` on shutdown if the resource was created.
    #[must_use]
    pub fn with_teardown<F, Fut>(mut self, teardown: F) -> Self
    where
        F: Fn(Arc<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HermesResult<()>> + Send + 'static,
    {
        self.teardown = Some(Box::new(move |resource| Box::pin(teardown(resource))));
        self
    }

    /// Whether the resource has been created.
    pub fn is_created(&self) -> bool {
        self.created.get().is_some()
    }
}

impl<R> fmt::Debug for ResourcePlugin<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePlugin")
            .field("name", &self.name)
            .field("teardown", &self.teardown.is_some())
            .field("created", &self.created.get().is_some())
            .finish()
    }
}

impl<R: Send + Sync + 'static> Plugin for ResourcePlugin<R> {
    type Aux = Resource<R>;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn create(&self) -> HermesResult<Resource<R>> {
        let resource = Arc::new((self.factory)().await?);
        if self.created.set(Arc::clone(&resource)).is_err() {
            tracing::warn!(plugin = self.name, "resource created more than once");
        }
        tracing::debug!(plugin = self.name, "resource created");
        Ok(Resource(resource))
    }

    async fn destroy(&self) -> HermesResult<()> {
        let (Some(teardown), Some(resource)) = (&self.teardown, self.created.get()) else {
            return Ok(());
        };
        tracing::debug!(plugin = self.name, "tearing down resource");
        teardown(Arc::clone(resource)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::HermesError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Pool {
        closed: AtomicBool,
    }

    #[tokio::test]
    async fn test_create_and_teardown() {
        let plugin = ResourcePlugin::new("pool", || async {
            Ok::<_, HermesError>(Pool {
                closed: AtomicBool::new(false),
            })
        })
        .with_teardown(|pool: Arc<Pool>| async move {
            pool.closed.store(true, Ordering::SeqCst);
            Ok::<_, HermesError>(())
        });

        assert!(!plugin.is_created());
        let resource = plugin.create().await.unwrap();
        assert!(plugin.is_created());
        assert!(!resource.closed.load(Ordering::SeqCst));

        plugin.destroy().await.unwrap();
        assert!(resource.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_teardown_skipped_when_never_created() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let plugin = ResourcePlugin::new("lazy", || async { Ok::<_, HermesError>(1_u8) })
            .with_teardown(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HermesError>(())
                }
            });

        plugin.destroy().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_factory_error() {
        let plugin: ResourcePlugin<u8> = ResourcePlugin::new("broken", || async {
            Err(HermesError::external("redis", "connection refused"))
        });
        let error = plugin.create().await.unwrap_err();
        assert_eq!(error.message(), "connection refused");
        assert!(!plugin.is_created());
        assert!(format!("{plugin:?}").contains("broken"));
    }

    #[tokio::test]
    async fn test_resource_derefs_and_shares() {
        let plugin =
            ResourcePlugin::new("numbers", || async { Ok::<_, HermesError>(vec![1, 2, 3]) });
        let resource = plugin.create().await.unwrap();
        assert_eq!(resource.len(), 3);
        let clone = resource.clone();
        assert!(Arc::ptr_eq(&resource.handle(), &clone.handle()));
    }
}
