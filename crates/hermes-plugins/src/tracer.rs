//! Business event tracing to a message queue.
//!
//! Handlers open a [`TracerScope`] for a (key, action) pair and push events
//! into it. Events are buffered in the invocation slots and flushed to a
//! [`QueueSink`] by the plugin's `end` hook, in batches of
//! [`BATCH_SIZE`]. A failed invocation also records an `error` event for the
//! most recently opened scope.

use hermes_config::TracerConfig;
use hermes_core::{BoxFuture, Context, HermesResult, HookContext, InvocationSlots, Plugin};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum entries per queue batch.
pub const BATCH_SIZE: usize = 10;

const DEFAULT_VERSION: &str = "0.0.0";
const NOTHING_KEY: &str = "nothing";
const UNKNOWN_ACTION: &str = "unknown";

/// One traced event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerLog {
    /// Random ID of the event.
    pub uuid: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Service route.
    pub route: String,
    /// Entity key, such as an order ID.
    pub key: String,
    /// Owning system.
    pub system: String,
    /// What happened to the entity.
    pub action: String,
    /// Which attribute the body describes.
    pub attribute: String,
    /// Payload.
    pub body: String,
    /// Whether this records a failure.
    pub error: bool,
    /// Client user agent.
    pub client: String,
    /// Client version.
    pub version: String,
}

/// Explicit event for [`TracerScope::send`]; unset fields come from the
/// scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracerLogInput {
    /// Overrides the route.
    pub route: Option<String>,
    /// Overrides the key.
    pub key: Option<String>,
    /// Overrides the system.
    pub system: Option<String>,
    /// Overrides the action.
    pub action: Option<String>,
    /// Attribute name.
    pub attribute: String,
    /// Payload.
    pub body: String,
    /// Failure flag, `false` when unset.
    pub error: Option<bool>,
    /// Overrides the client.
    pub client: Option<String>,
    /// Overrides the version.
    pub version: Option<String>,
}

impl TracerLogInput {
    /// Input with just an attribute and body.
    pub fn new(attribute: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            body: body.into(),
            ..Self::default()
        }
    }
}

/// One message of a queue batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Batch-unique ID, `{key}_{uuid}`.
    pub id: String,
    /// JSON of the [`TracerLog`].
    pub body: String,
}

/// Where traced events go.
pub trait QueueSink: Send + Sync + 'static {
    /// Sends one batch of at most [`BATCH_SIZE`] entries to `queue`.
    fn send_batch<'a>(
        &'a self,
        queue: &'a str,
        entries: Vec<QueueEntry>,
    ) -> BoxFuture<'a, HermesResult<()>>;
}

/// Sink that keeps batches in memory, keyed by queue.
#[derive(Debug, Default)]
pub struct MemorySink {
    queues: Mutex<HashMap<String, Vec<Vec<QueueEntry>>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches received for `queue`, oldest first.
    pub fn batches(&self, queue: &str) -> Vec<Vec<QueueEntry>> {
        self.queues.lock().get(queue).cloned().unwrap_or_default()
    }

    /// Every log received for `queue`, decoded.
    pub fn logs(&self, queue: &str) -> Vec<TracerLog> {
        self.batches(queue)
            .into_iter()
            .flatten()
            .filter_map(|entry| serde_json::from_str(&entry.body).ok())
            .collect()
    }
}

impl QueueSink for MemorySink {
    fn send_batch<'a>(
        &'a self,
        queue: &'a str,
        entries: Vec<QueueEntry>,
    ) -> BoxFuture<'a, HermesResult<()>> {
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push(entries);
        Box::pin(futures_util::future::ready(Ok(())))
    }
}

#[derive(Debug, Clone)]
struct ClientInfo {
    agent: String,
    version: String,
}

/// Per-invocation tracer state kept in the slots.
#[derive(Debug)]
struct TraceState {
    client: ClientInfo,
    last_key: String,
    last_action: String,
    buffer: Vec<TracerLog>,
    // Set once `end` has drained the buffer; later logs are sent directly.
    flushed: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            client: ClientInfo {
                agent: String::new(),
                version: String::new(),
            },
            last_key: NOTHING_KEY.to_string(),
            last_action: UNKNOWN_ACTION.to_string(),
            buffer: Vec::new(),
            flushed: false,
        }
    }
}

/// Fragment contributed by [`TracerPlugin`].
#[derive(Debug, Clone)]
pub struct TracerAux {
    /// Opens scopes.
    pub tracer: Tracer,
}

/// Opens [`TracerScope`]s for the current invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracer {
    route: Arc<str>,
    system: Arc<str>,
}

impl Tracer {
    /// Opens a scope for `key` and `action` and remembers it as the last
    /// scope of the invocation.
    pub fn scope<'c, C: ?Sized>(
        &self,
        ctx: &'c Context<C>,
        key: impl Into<String>,
        action: impl Into<String>,
    ) -> TracerScope<'c> {
        let key = key.into();
        let action = action.into();
        let client = ctx.slots().with_or_default(|state: &mut TraceState| {
            state.last_key.clone_from(&key);
            state.last_action.clone_from(&action);
            state.client.clone()
        });
        TracerScope {
            slots: ctx.slots(),
            route: self.route.to_string(),
            system: self.system.to_string(),
            key,
            action,
            client: client.agent,
            version: client.version,
        }
    }
}

/// Buffers events for one (key, action) pair.
pub struct TracerScope<'c> {
    slots: &'c InvocationSlots,
    route: String,
    system: String,
    key: String,
    action: String,
    client: String,
    version: String,
}

impl TracerScope<'_> {
    /// Buffers an event with this scope's fields.
    pub fn push(&self, attribute: impl Into<String>, body: impl Into<String>, error: bool) {
        self.send(TracerLogInput {
            error: Some(error),
            ..TracerLogInput::new(attribute, body)
        });
    }

    /// Buffers an event, taking unset fields from this scope.
    pub fn send(&self, input: TracerLogInput) {
        let log = TracerLog {
            uuid: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            route: input.route.unwrap_or_else(|| self.route.clone()),
            key: input.key.unwrap_or_else(|| self.key.clone()),
            system: input.system.unwrap_or_else(|| self.system.clone()),
            action: input.action.unwrap_or_else(|| self.action.clone()),
            attribute: input.attribute,
            body: input.body,
            error: input.error.unwrap_or(false),
            client: input.client.unwrap_or_else(|| self.client.clone()),
            version: input.version.unwrap_or_else(|| self.version.clone()),
        };
        self.slots
            .with_or_default(|state: &mut TraceState| state.buffer.push(log));
    }
}

impl fmt::Debug for TracerScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerScope")
            .field("key", &self.key)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Traces business events to a queue.
pub struct TracerPlugin {
    route: Arc<str>,
    system: Arc<str>,
    queue_name: String,
    sink: Arc<dyn QueueSink>,
}

impl TracerPlugin {
    /// Creates a tracer plugin writing to `queue_name` through `sink`.
    pub fn new(
        route: impl Into<Arc<str>>,
        system: impl Into<Arc<str>>,
        queue_name: impl Into<String>,
        sink: Arc<dyn QueueSink>,
    ) -> Self {
        Self {
            route: route.into(),
            system: system.into(),
            queue_name: queue_name.into(),
            sink,
        }
    }

    /// Creates a tracer plugin from the `tracer` config section.
    pub fn from_config(config: &TracerConfig, sink: Arc<dyn QueueSink>) -> Self {
        Self::new(
            config.route.as_str(),
            config.system.as_str(),
            config.queue_name.as_str(),
            sink,
        )
    }

    async fn flush(&self, buffer: Vec<TracerLog>) -> HermesResult<()> {
        for chunk in buffer.chunks(BATCH_SIZE) {
            let entries = chunk
                .iter()
                .map(|log| -> HermesResult<QueueEntry> {
                    Ok(QueueEntry {
                        id: format!("{}_{}", log.key, log.uuid),
                        body: serde_json::to_string(log)?,
                    })
                })
                .collect::<HermesResult<Vec<_>>>()?;
            self.sink.send_batch(&self.queue_name, entries).await?;
        }
        Ok(())
    }

    async fn send_logged(&self, buffer: Vec<TracerLog>) {
        let count = buffer.len();
        match self.flush(buffer).await {
            Ok(()) => tracing::debug!(
                plugin = "tracer",
                count,
                queue = %self.queue_name,
                "trace logs flushed"
            ),
            Err(error) => tracing::warn!(
                plugin = "tracer",
                queue = %self.queue_name,
                error = %error,
                "failed to flush trace logs"
            ),
        }
    }
}

impl fmt::Debug for TracerPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerPlugin")
            .field("route", &self.route)
            .field("system", &self.system)
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}

impl Plugin for TracerPlugin {
    type Aux = TracerAux;

    fn name(&self) -> &'static str {
        "tracer"
    }

    async fn create(&self) -> HermesResult<TracerAux> {
        Ok(TracerAux {
            tracer: Tracer {
                route: Arc::clone(&self.route),
                system: Arc::clone(&self.system),
            },
        })
    }

    async fn begin(&self, ctx: &HookContext) -> HermesResult<()> {
        let request = ctx.request();
        let version = request.header("X-Version").unwrap_or(DEFAULT_VERSION);
        let agent = request
            .header("User-Agent")
            .filter(|agent| !agent.is_empty())
            .or_else(|| {
                request
                    .platform_context()
                    .pointer("/identity/userAgent")
                    .and_then(serde_json::Value::as_str)
            })
            .unwrap_or_default();
        let client = ClientInfo {
            agent: agent.to_string(),
            version: version.to_string(),
        };
        ctx.slots()
            .with_or_default(|state: &mut TraceState| state.client = client);
        Ok(())
    }

    async fn error(&self, ctx: &HookContext) -> HermesResult<()> {
        let Some(error) = ctx.request().last_error() else {
            return Ok(());
        };
        let (key, action) = ctx.slots().with_or_default(|state: &mut TraceState| {
            (state.last_key.clone(), state.last_action.clone())
        });
        let tracer = Tracer {
            route: Arc::clone(&self.route),
            system: Arc::clone(&self.system),
        };
        tracer.scope(ctx, key, action).push("error", error.to_string(), true);

        // End hooks run before error recovery, so the buffer may already be
        // gone. Send the error log on its own in that case.
        let late = ctx.slots().with_or_default(|state: &mut TraceState| {
            if state.flushed {
                std::mem::take(&mut state.buffer)
            } else {
                Vec::new()
            }
        });
        if !late.is_empty() {
            self.send_logged(late).await;
        }
        Ok(())
    }

    async fn end(&self, ctx: &HookContext) -> HermesResult<()> {
        let buffer = ctx.slots().with_or_default(|state: &mut TraceState| {
            state.flushed = true;
            std::mem::take(&mut state.buffer)
        });
        if !buffer.is_empty() {
            self.send_logged(buffer).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{
        AuxNil, Capabilities, HandlerRequest, HandlerResponse, HermesError, InvocationId,
    };
    use serde_json::json;

    fn hook_context(event: serde_json::Value, platform: serde_json::Value) -> HookContext {
        let aux: Arc<dyn Capabilities> = Arc::new(AuxNil);
        Context::new(
            InvocationId::new(),
            Arc::new(HandlerRequest::new(event, platform)),
            Arc::new(HandlerResponse::new(Box::new(|_| {}))),
            aux,
            Arc::new(InvocationSlots::new()),
        )
    }

    struct FailingSink;

    impl QueueSink for FailingSink {
        fn send_batch<'a>(
            &'a self,
            _queue: &'a str,
            _entries: Vec<QueueEntry>,
        ) -> BoxFuture<'a, HermesResult<()>> {
            Box::pin(async { Err(HermesError::external("queue", "throttled")) })
        }
    }

    fn plugin(sink: Arc<dyn QueueSink>) -> TracerPlugin {
        TracerPlugin::new("/orders", "shop", "trace-queue", sink)
    }

    #[tokio::test]
    async fn test_begin_captures_client() {
        let sink = Arc::new(MemorySink::new());
        let plugin = plugin(sink.clone());
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context(
            json!({"headers": {"x-version": "2.1.0"}}),
            json!({"identity": {"userAgent": "console"}}),
        );

        plugin.begin(&ctx).await.unwrap();
        aux.tracer.scope(&ctx, "order-1", "create").push("amount", "42", false);
        plugin.end(&ctx).await.unwrap();

        let logs = sink.logs("trace-queue");
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.client, "console");
        assert_eq!(log.version, "2.1.0");
        assert_eq!(log.route, "/orders");
        assert_eq!(log.system, "shop");
        assert_eq!(log.key, "order-1");
        assert_eq!(log.action, "create");
        assert!(!log.error);
    }

    #[tokio::test]
    async fn test_default_version_and_header_agent() {
        let sink = Arc::new(MemorySink::new());
        let plugin = plugin(sink.clone());
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context(json!({"headers": {"User-Agent": "curl"}}), json!({}));

        plugin.begin(&ctx).await.unwrap();
        aux.tracer.scope(&ctx, "k", "a").send(TracerLogInput {
            key: Some("override".to_string()),
            ..TracerLogInput::new("attr", "body")
        });
        plugin.end(&ctx).await.unwrap();

        let log = &sink.logs("trace-queue")[0];
        assert_eq!(log.client, "curl");
        assert_eq!(log.version, "0.0.0");
        assert_eq!(log.key, "override");
        assert_eq!(log.action, "a");
    }

    #[tokio::test]
    async fn test_flush_in_batches_of_ten() {
        let sink = Arc::new(MemorySink::new());
        let plugin = plugin(sink.clone());
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context(json!({}), json!({}));

        let scope = aux.tracer.scope(&ctx, "bulk", "import");
        for i in 0..23 {
            scope.push("row", i.to_string(), false);
        }
        plugin.end(&ctx).await.unwrap();

        let batches = sink.batches("trace-queue");
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert!(batches[0][0].id.starts_with("bulk_"));

        // The buffer is drained.
        plugin.end(&ctx).await.unwrap();
        assert_eq!(sink.batches("trace-queue").len(), 3);
    }

    #[tokio::test]
    async fn test_error_uses_last_scope() {
        let sink = Arc::new(MemorySink::new());
        let plugin = plugin(sink.clone());
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context(json!({}), json!({}));

        aux.tracer.scope(&ctx, "first", "one");
        aux.tracer.scope(&ctx, "second", "two");
        ctx.request()
            .record_error(Arc::new(HermesError::internal("db down")));
        plugin.error(&ctx).await.unwrap();
        plugin.end(&ctx).await.unwrap();

        let logs = sink.logs("trace-queue");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].key, "second");
        assert_eq!(logs[0].action, "two");
        assert_eq!(logs[0].attribute, "error");
        assert!(logs[0].error);
        assert!(logs[0].body.contains("db down"));
    }

    #[tokio::test]
    async fn test_error_after_end_is_sent_directly() {
        let sink = Arc::new(MemorySink::new());
        let plugin = plugin(sink.clone());
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context(json!({}), json!({}));

        aux.tracer.scope(&ctx, "k1", "act").push("a", "b", false);
        plugin.end(&ctx).await.unwrap();
        assert_eq!(sink.batches("trace-queue").len(), 1);

        ctx.request()
            .record_error(Arc::new(HermesError::internal("flush failed")));
        plugin.error(&ctx).await.unwrap();

        let batches = sink.batches("trace-queue");
        assert_eq!(batches.len(), 2);
        let logs = sink.logs("trace-queue");
        let error_log = &logs[1];
        assert!(error_log.error);
        assert_eq!(error_log.key, "k1");
        assert_eq!(error_log.action, "act");
        assert!(error_log.body.contains("flush failed"));
    }

    #[tokio::test]
    async fn test_error_without_scope_defaults() {
        let sink = Arc::new(MemorySink::new());
        let plugin = plugin(sink.clone());
        let ctx = hook_context(json!({}), json!({}));

        // No last error: nothing is traced.
        plugin.error(&ctx).await.unwrap();
        ctx.request()
            .record_error(Arc::new(HermesError::bad_request("bad input")));
        plugin.error(&ctx).await.unwrap();
        plugin.end(&ctx).await.unwrap();

        let logs = sink.logs("trace-queue");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].key, "nothing");
        assert_eq!(logs[0].action, "unknown");
    }

    #[tokio::test]
    async fn test_flush_failure_is_swallowed() {
        let plugin = plugin(Arc::new(FailingSink));
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context(json!({}), json!({}));
        aux.tracer.scope(&ctx, "k", "a").push("x", "y", false);
        assert!(plugin.end(&ctx).await.is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = TracerConfig {
            route: "/r".to_string(),
            system: "s".to_string(),
            queue_name: "q".to_string(),
            region: None,
        };
        let plugin = TracerPlugin::from_config(&config, Arc::new(MemorySink::new()));
        assert!(format!("{plugin:?}").contains("\"q\""));
    }
}
