//! # Hermes
//!
//! **Plugin middleware for serverless handlers**
//!
//! Hermes wraps a single async handler with an ordered list of plugins:
//!
//! - **Capabilities**: each plugin builds a fragment once per deployment; the
//!   handler sees all fragments merged, typed by the plugin list
//! - **Lifecycle Hooks**: begin, end and error hooks around every invocation
//! - **Failure Recovery**: a failing phase never prevents the callback from
//!   firing exactly once with an error response
//! - **Bundled Plugins**: logging, queue tracing, temp files and shared
//!   resources
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hermes::prelude::*;
//!
//! let handler = hermes::build()
//!     .plugin(LoggerPlugin::new("users"))
//!     .handler(|ctx: Context<AuxLayer<AuxNil, LoggerAux>>| async move {
//!         ctx.aux().get::<LoggerAux, _>().logger.info("hello");
//!         Ok::<_, HermesError>(serde_json::json!({ "ok": true }))
//!     });
//!
//! handler.call(event, context, callback).await?;
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! resolve capabilities (once) → begin hooks → handler → end hooks
//!                                    ↓ failure      ↓ failure
//!                          record → error hooks → error response
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use hermes_core as core;

// Re-export configuration
pub use hermes_config as config;

// Re-export middleware types
pub use hermes_middleware as middleware;

// Re-export bundled plugins
pub use hermes_plugins as plugins;

// Re-export telemetry
pub use hermes_telemetry as telemetry;

pub use hermes_middleware::build;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use hermes_core::{
        AuxLayer, AuxNil, Capabilities, Context, Handler, HandlerRequest, HandlerResponse,
        HermesError, HermesResult, HookContext, Plugin, ResponseEnvelope, SharedError,
    };

    pub use hermes_config::{ConfigLoader, HermesConfig, Stage};

    pub use hermes_middleware::{build, HandlerFn, InvocationOptions, InvocationReport};

    pub use hermes_plugins::{
        LogLevel, LoggerAux, LoggerPlugin, Resource, ResourcePlugin, TempFileAux,
        TempFilePlugin, TracerAux, TracerPlugin,
    };
}
