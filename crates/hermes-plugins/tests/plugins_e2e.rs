//! The bundled plugins working together behind one handler.

use hermes_core::{AuxLayer, AuxNil, Context, HermesError, HermesResult, HookContext, Plugin};
use hermes_middleware::build;
use hermes_plugins::{
    LogLevel, LoggerAux, LoggerPlugin, MemorySink, Resource, ResourcePlugin, TempFileAux,
    TempFilePlugin, TracerAux, TracerPlugin,
};
use parking_lot::Mutex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Orders {
    placed: AtomicUsize,
    closed: AtomicBool,
}

type Aux = AuxLayer<
    AuxLayer<AuxLayer<AuxLayer<AuxNil, LoggerAux>, TracerAux>, TempFileAux>,
    Resource<Orders>,
>;

#[tokio::test]
async fn test_plugins_through_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let last_temp: Arc<Mutex<Option<PathBuf>>> = Arc::default();
    let temp_slot = Arc::clone(&last_temp);

    let handler = build()
        .strict(false)
        .plugin(LoggerPlugin::new("orders").level(LogLevel::Info))
        .plugin(TracerPlugin::new("/orders", "shop", "trace", sink.clone()))
        .plugin(TempFilePlugin::new().location(dir.path().to_str().unwrap()))
        .plugin(
            ResourcePlugin::new("orders-db", || async { Ok::<_, HermesError>(Orders::default()) })
                .with_teardown(|orders: Arc<Orders>| async move {
                    orders.closed.store(true, Ordering::SeqCst);
                    Ok::<_, HermesError>(())
                }),
        )
        .handler(move |ctx: Context<Aux>| {
            let temp_slot = Arc::clone(&temp_slot);
            async move {
                let id = ctx.request().path_param("id").unwrap_or("none").to_string();
                ctx.aux().get::<LoggerAux, _>().logger.info(format_args!("placing {id}"));

                let scope = ctx.aux().get::<TracerAux, _>().tracer.scope(&ctx, id.clone(), "place");
                scope.push("status", "started", false);

                let path = ctx.aux().get::<TempFileAux, _>().temp_files.generate(&ctx);
                tokio::fs::write(&path, b"receipt").await.map_err(anyhow::Error::from)?;
                *temp_slot.lock() = Some(path);

                if ctx.request().query_param("fail").is_some() {
                    return Err(HermesError::unprocessable("payment declined"));
                }

                let orders = ctx.aux().get::<Resource<Orders>, _>();
                let placed = orders.placed.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({ "id": id, "placed": placed }))
            }
        });

    let event = json!({
        "pathParameters": { "id": "order-7" },
        "headers": { "User-Agent": "shop-app", "X-Version": "3.2.1" }
    });
    let response = handler.invoke(event, json!({})).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.json().unwrap(), json!({ "id": "order-7", "placed": 1 }));

    let temp = last_temp.lock().take().unwrap();
    assert!(temp.starts_with(dir.path()));
    assert!(!temp.exists());

    let logs = sink.logs("trace");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].client, "shop-app");
    assert_eq!(logs[0].version, "3.2.1");

    // A failing invocation traces the error under the last scope.
    let event = json!({
        "pathParameters": { "id": "order-8" },
        "queryStringParameters": { "fail": "1" }
    });
    let response = handler.invoke(event, json!({})).await.unwrap();
    assert_eq!(response.status_code, 422);
    assert_eq!(response.json().unwrap(), json!({ "error": "payment declined" }));
    assert!(!last_temp.lock().take().unwrap().exists());

    let logs = sink.logs("trace");
    assert_eq!(logs.len(), 3);
    let error_log = logs.iter().find(|log| log.error).unwrap();
    assert_eq!(error_log.key, "order-8");
    assert_eq!(error_log.action, "place");
    assert_eq!(error_log.attribute, "error");
    assert_eq!(error_log.version, "0.0.0");

    handler.shutdown().await.unwrap();
    let orders = handler.middleware().resolve().await.unwrap();
    assert!(orders.get::<Resource<Orders>, _>().closed.load(Ordering::SeqCst));
}

/// Fails its `end` hook, after the tracer has already drained its buffer.
struct BrokenExporter;

impl Plugin for BrokenExporter {
    type Aux = ();

    fn name(&self) -> &'static str {
        "broken-exporter"
    }

    async fn create(&self) -> HermesResult<()> {
        Ok(())
    }

    async fn end(&self, _ctx: &HookContext) -> HermesResult<()> {
        Err(HermesError::internal("export failed"))
    }
}

#[tokio::test]
async fn test_end_failure_of_another_plugin_is_traced() {
    let sink = Arc::new(MemorySink::new());
    let handler = build()
        .strict(false)
        .plugin(TracerPlugin::new("/orders", "shop", "trace", sink.clone()))
        .plugin(BrokenExporter)
        .handler(|ctx: Context<AuxLayer<AuxLayer<AuxNil, TracerAux>, ()>>| async move {
            let tracer = &ctx.aux().get::<TracerAux, _>().tracer;
            tracer.scope(&ctx, "k1", "act").push("a", "b", false);
            Ok::<_, HermesError>(json!({ "ok": true }))
        });

    for round in 1..=2 {
        let response = handler.invoke(json!({}), json!({})).await.unwrap();
        assert_eq!(response.status_code, 200);

        let logs = sink.logs("trace");
        assert_eq!(logs.len(), round * 2);
        let errors: Vec<_> = logs.iter().filter(|log| log.error).collect();
        assert_eq!(errors.len(), round);
        assert!(errors.iter().all(|log| log.key == "k1" && log.action == "act"));
        assert!(errors[0].body.contains("export failed"));
    }
}
