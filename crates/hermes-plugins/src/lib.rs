//! # Hermes Plugins
//!
//! Ready-made plugins for the Hermes middleware:
//!
//! | Plugin | Fragment | Lifecycle |
//! |--------|----------|-----------|
//! | [`LoggerPlugin`] | [`LoggerAux`] | none |
//! | [`TracerPlugin`] | [`TracerAux`] | client capture, error trace, flush |
//! | [`TempFilePlugin`] | [`TempFileAux`] | `end` removes generated files |
//! | [`ResourcePlugin`] | [`Resource`] | `destroy` runs the teardown |

#![doc(html_root_url = "https://docs.rs/hermes-plugins/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod logger;
pub mod resource;
pub mod temp_file;
pub mod tracer;

pub use logger::{LogLevel, Logger, LoggerAux, LoggerPlugin};
pub use resource::{Resource, ResourcePlugin};
pub use temp_file::{TempFileAux, TempFilePlugin, TempFiles};
pub use tracer::{
    MemorySink, QueueEntry, QueueSink, Tracer, TracerAux, TracerLog, TracerLogInput,
    TracerPlugin, TracerScope,
};
