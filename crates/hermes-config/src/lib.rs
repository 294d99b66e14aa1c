//! Typed configuration for Hermes.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Inline strings and JSON objects
//! - Remote configuration fetched over HTTP
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Staging levels ([`Stage`])
//!
//! # Overview
//!
//! [`HermesConfig`] holds every section:
//!
//! - `stage` - Deployment [`Stage`]; `test` turns strict mode on
//! - `logging` - [`LogConfig`](hermes_telemetry::LogConfig)
//! - [`MiddlewareConfig`] - Strict mode override and CORS headers
//! - [`TracerConfig`] - Tracer plugin route, system and queue
//! - [`TempFileConfig`] - Temp-file plugin prefix and location
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("hermes.toml")?
//!     .with_env_prefix("HERMES")
//!     .load()?;
//!
//! println!("strict mode: {}", config.strict());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! stage = "beta"
//!
//! [logging]
//! level = "info"
//! json_format = true
//!
//! [middleware]
//! strict = false
//!
//! [middleware.cors]
//! allow_origin = "*"
//! allow_headers = "X-Version"
//! allow_credentials = true
//!
//! [tracer]
//! route = "/users"
//! system = "accounts"
//! queue_name = "trace-events"
//!
//! [temp_file]
//! prefix = "temp-"
//! location = "/tmp"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `HERMES__STAGE=test`
//! - `HERMES__MIDDLEWARE__STRICT=true`
//! - `HERMES__TRACER__QUEUE_NAME=trace-events`
//!
//! The plain `STAGE` variable is read as well, below `HERMES__STAGE`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;
pub mod stage;

pub use config::*;
pub use error::ConfigError;
pub use loader::{ConfigLoader, Format};
pub use schema::*;
pub use stage::Stage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HermesConfig::default();
        assert_eq!(config.stage, Stage::Local);
        assert_eq!(config.temp_file.location, "/tmp");
    }

    #[test]
    fn test_config_builder() {
        let config = HermesConfig::builder()
            .stage(Stage::Beta)
            .temp_file(TempFileConfig {
                location: "/var/tmp".to_string(),
                ..Default::default()
            })
            .build();

        assert_eq!(config.stage, Stage::Beta);
        assert_eq!(config.temp_file.location, "/var/tmp");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = HermesConfig::test();
        let text = toml::to_string(&config).unwrap();
        let parsed = ConfigLoader::new().with_string(&text, "toml").unwrap().load().unwrap();
        assert_eq!(parsed, config);
    }
}
