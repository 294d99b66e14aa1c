//! # Hermes Core
//!
//! Core types and traits for the Hermes plugin middleware.
//!
//! This crate provides the foundational types used throughout Hermes:
//!
//! - [`Plugin`] - Lifecycle participant contributing a capability fragment
//! - [`AuxLayer`] / [`Capabilities`] - The merged capability bundle
//! - [`Context`] - Per-invocation request, response, bundle and slots
//! - [`HandlerRequest`] - Lazily parsed view of the inbound event
//! - [`HandlerResponse`] - Exactly-once completion of the invocation
//! - [`HermesError`] - Standard error types
//! - [`Handler`] - Core handler trait

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aux;
mod context;
mod error;
mod handler;
pub mod plugin;
mod request;
mod response;

pub use aux::{AuxLayer, AuxNil, Capabilities, Has, Here, There};
pub use context::{Context, HookContext, InvocationId, InvocationSlots};
pub use error::{ErrorBody, ErrorCategory, HermesError, HermesResult, SharedError};
pub use handler::Handler;
pub use plugin::{BoxFuture, HookKind, Phase, Plugin, PluginHooks};
pub use request::HandlerRequest;
pub use response::{Callback, CookieOptions, CorsPolicy, HandlerResponse, ResponseEnvelope};
