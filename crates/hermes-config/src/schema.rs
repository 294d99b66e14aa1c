//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use hermes_core::CorsPolicy;
use serde::{Deserialize, Serialize};

/// Middleware section.
///
/// # Example
///
/// ```
/// use hermes_config::MiddlewareConfig;
///
/// let config = MiddlewareConfig::default();
/// assert_eq!(config.strict, None);
/// assert_eq!(config.cors.allow_origin, "*");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Forces strict mode on or off. Unset means "on in the test stage".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Base CORS headers attached to every response.
    #[serde(default)]
    pub cors: CorsPolicy,
}

/// Tracer plugin section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TracerConfig {
    /// Route recorded on every trace log.
    #[serde(default)]
    pub route: String,

    /// System recorded on every trace log.
    #[serde(default)]
    pub system: String,

    /// Name of the queue receiving trace logs.
    #[serde(default)]
    pub queue_name: String,

    /// Region of the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl TracerConfig {
    /// Returns `true` once a queue name is configured.
    pub fn is_configured(&self) -> bool {
        !self.queue_name.is_empty()
    }
}

/// Temp-file plugin section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TempFileConfig {
    /// File name prefix.
    #[serde(default = "default_temp_prefix")]
    pub prefix: String,

    /// Directory the files are created in.
    #[serde(default = "default_temp_location")]
    pub location: String,
}

impl Default for TempFileConfig {
    fn default() -> Self {
        Self {
            prefix: default_temp_prefix(),
            location: default_temp_location(),
        }
    }
}

fn default_temp_prefix() -> String {
    "temp-".to_string()
}

fn default_temp_location() -> String {
    "/tmp".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_defaults() {
        let config = TempFileConfig::default();
        assert_eq!(config.prefix, "temp-");
        assert_eq!(config.location, "/tmp");

        let partial: TempFileConfig = toml::from_str(r#"prefix = "upload-""#).unwrap();
        assert_eq!(partial.prefix, "upload-");
        assert_eq!(partial.location, "/tmp");
    }

    #[test]
    fn test_middleware_cors_override() {
        let config: MiddlewareConfig = toml::from_str(
            r#"
            strict = true
            [cors]
            allow_origin = "https://app.example"
            "#,
        )
        .unwrap();
        assert_eq!(config.strict, Some(true));
        assert_eq!(config.cors.allow_origin, "https://app.example");
        assert_eq!(config.cors.allow_headers, "X-Version");
    }

    #[test]
    fn test_tracer_is_configured() {
        assert!(!TracerConfig::default().is_configured());
        let config = TracerConfig {
            queue_name: "trace-queue".to_string(),
            ..TracerConfig::default()
        };
        assert!(config.is_configured());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(toml::from_str::<TracerConfig>("queue = \"x\"").is_err());
        assert!(toml::from_str::<MiddlewareConfig>("strictness = 1").is_err());
    }
}
