//! Main configuration types.
//!
//! This module provides the top-level [`HermesConfig`] struct and its builder.

use hermes_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, MiddlewareConfig, Stage, TempFileConfig, TracerConfig};

/// Complete Hermes configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from
/// files, URLs, inline objects and environment variables.
///
/// # Example
///
/// ```
/// use hermes_config::{HermesConfig, Stage};
///
/// let config = HermesConfig::default();
/// assert_eq!(config.stage, Stage::Local);
/// assert!(!config.strict());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Deployment stage.
    #[serde(default)]
    pub stage: Stage,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,

    /// Middleware behavior.
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Tracer plugin settings.
    #[serde(default)]
    pub tracer: TracerConfig,

    /// Temp-file plugin settings.
    #[serde(default)]
    pub temp_file: TempFileConfig,
}

impl HermesConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> HermesConfigBuilder {
        HermesConfigBuilder::new()
    }

    /// Whether phase errors are returned to the caller.
    ///
    /// `middleware.strict` wins when set; otherwise strict mode follows the
    /// `test` stage.
    pub fn strict(&self) -> bool {
        self.middleware.strict.unwrap_or_else(|| self.stage.is_test())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging
            .validate()
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;

        if self.temp_file.location.is_empty() {
            return Err(ConfigError::invalid_value(
                "temp_file.location",
                "must not be empty",
            ));
        }
        if self.temp_file.prefix.contains('/') {
            return Err(ConfigError::invalid_value(
                "temp_file.prefix",
                "must not contain a path separator",
            ));
        }

        if self.tracer.is_configured() && self.tracer.route.is_empty() {
            return Err(ConfigError::validation_error(
                "tracer.route must be set when tracer.queue_name is set",
            ));
        }

        if self.middleware.cors.allow_origin.is_empty() {
            return Err(ConfigError::invalid_value(
                "middleware.cors.allow_origin",
                "must not be empty",
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, `local` stage.
    #[must_use]
    pub fn development() -> Self {
        Self {
            stage: Stage::Local,
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Production preset: JSON info logs, `release` stage.
    #[must_use]
    pub fn production() -> Self {
        Self {
            stage: Stage::Release,
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Test preset: `test` stage, so strict mode is on.
    #[must_use]
    pub fn test() -> Self {
        Self {
            stage: Stage::Test,
            logging: LogConfig {
                level: "debug".to_string(),
                json_format: false,
                ..LogConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Builder for [`HermesConfig`].
#[derive(Debug, Default)]
pub struct HermesConfigBuilder {
    config: HermesConfig,
}

impl HermesConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stage.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.config.stage = stage;
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Set the middleware configuration.
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareConfig) -> Self {
        self.config.middleware = middleware;
        self
    }

    /// Force strict mode on or off.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.middleware.strict = Some(strict);
        self
    }

    /// Set the tracer configuration.
    #[must_use]
    pub fn tracer(mut self, tracer: TracerConfig) -> Self {
        self.config.tracer = tracer;
        self
    }

    /// Set the temp-file configuration.
    #[must_use]
    pub fn temp_file(mut self, temp_file: TempFileConfig) -> Self {
        self.config.temp_file = temp_file;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> HermesConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_follows_stage() {
        assert!(!HermesConfig::default().strict());
        assert!(HermesConfig::test().strict());
        assert!(!HermesConfig::production().strict());
    }

    #[test]
    fn test_strict_override_wins() {
        let config = HermesConfig::builder()
            .stage(Stage::Test)
            .strict(false)
            .build();
        assert!(!config.strict());

        let config = HermesConfig::builder()
            .stage(Stage::Release)
            .strict(true)
            .build();
        assert!(config.strict());
    }

    #[test]
    fn test_presets_validate() {
        HermesConfig::default().validate().unwrap();
        HermesConfig::development().validate().unwrap();
        HermesConfig::production().validate().unwrap();
        HermesConfig::test().validate().unwrap();
    }

    #[test]
    fn test_validate_tracer_needs_route() {
        let config = HermesConfig::builder()
            .tracer(TracerConfig {
                queue_name: "trace".to_string(),
                ..TracerConfig::default()
            })
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_temp_prefix() {
        let config = HermesConfig::builder()
            .temp_file(TempFileConfig {
                prefix: "a/b".to_string(),
                ..TempFileConfig::default()
            })
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let config = HermesConfig::builder()
            .logging(LogConfig {
                level: "hermes=[".to_string(),
                ..LogConfig::default()
            })
            .build();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("logging.level"));
    }
}
