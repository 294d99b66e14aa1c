//! # Hermes Middleware
//!
//! Composes plugins around a serverless function handler.
//!
//! ```text
//!                      ┌─────────────── MiddlewareSet (per deployment) ──────────┐
//! build()              │  chain: Cons<Cons<Nil, A>, B>                           │
//!   .plugin(a)   ───►  │  aux:   OnceCell<AuxLayer<AuxLayer<AuxNil, A>, B>>      │
//!   .plugin(b)         └─────────────────────────────────────────────────────────┘
//!   .handler(f)                                  │
//!        │                                       ▼
//!        ▼                       Invocation (per event)
//!    HandlerFn::call ──►  resolve ─► begin* ─► handler ─► end* ─► callback
//!                                      └──── error* ◄──┘
//! ```
//!
//! - [`build`] starts a [`Builder`]; each `.plugin(..)` extends the typed
//!   chain so the handler sees every fragment by type.
//! - [`MiddlewareSet`] creates the capability bundle once, on the first
//!   invocation, and shares it afterwards.
//! - [`Invocation`] runs hooks concurrently within a phase, routes every
//!   failure through the error hooks and completes the response exactly once.
//! - [`HandlerFn`] is the deployable function with the platform's
//!   `(event, context, callback)` shape.
//!
//! ## Example
//!
//! ```
//! use hermes_core::{AuxNil, Context, HermesError};
//! use hermes_middleware::build;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let handler = build()
//!     .strict(true)
//!     .handler(|ctx: Context<AuxNil>| async move {
//!         let name = ctx.request().query_param("name").unwrap_or("world").to_string();
//!         Ok::<_, HermesError>(json!({ "hello": name }))
//!     });
//!
//! let event = json!({ "queryStringParameters": { "name": "hermes" } });
//! let response = handler.invoke(event, json!({})).await.unwrap();
//! assert_eq!(response.status_code, 200);
//! assert_eq!(response.json().unwrap(), json!({ "hello": "hermes" }));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod builder;
pub mod chain;
mod guard;
pub mod invocation;
mod middleware_set;

pub use builder::{build, Builder, HandlerFn, InvocationOptions};
pub use chain::{Cons, Nil, PluginChain};
pub use invocation::{Invocation, InvocationReport, PhaseError};
pub use middleware_set::MiddlewareSet;
