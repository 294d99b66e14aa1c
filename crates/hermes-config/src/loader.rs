//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, inline values, URLs and environment
//! variables.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, HermesConfig, Stage};

/// Configuration source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// TOML document.
    Toml,
    /// JSON document.
    Json,
}

impl Format {
    fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn parse(self, content: &str) -> Result<Value, ConfigError> {
        match self {
            Self::Toml => {
                let table: toml::Value = toml::from_str(content)?;
                Ok(serde_json::to_value(table)?)
            }
            Self::Json => Ok(serde_json::from_str(content)?),
        }
    }
}

/// Configuration loader with layered approach.
///
/// Each source is deep-merged over the previous ones, so a layer only needs
/// the keys it changes:
/// 1. Default values (or a preset)
/// 2. Configuration file (TOML or JSON)
/// 3. Inline string or JSON object
/// 4. Remote URL
/// 5. `.env` file
/// 6. Environment variables (`PREFIX__SECTION__KEY`, plus `STAGE`)
///
/// # Example
///
/// ```no_run
/// use hermes_config::ConfigLoader;
///
/// # fn main() -> Result<(), hermes_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("hermes.toml")?
///     .with_env_prefix("HERMES")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    base: HermesConfig,
    layers: Vec<Value>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: HermesConfig::default(),
            layers: Vec::new(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.base = HermesConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.base = HermesConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.base = HermesConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is determined by the extension (`.toml` or `.json`).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let layer = Format::from_name(extension)?.parse(&content)?;
        self.push_layer(layer)?;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::{ConfigLoader, Stage};
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("stage = \"beta\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.stage, Stage::Beta);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = Format::from_name(format)?.parse(content)?;
        self.push_layer(layer)?;
        Ok(self)
    }

    /// Load configuration from an inline JSON object.
    pub fn with_value(mut self, value: Value) -> Result<Self, ConfigError> {
        self.push_layer(value)?;
        Ok(self)
    }

    /// Fetch configuration from a URL.
    ///
    /// TOML is detected from a `toml` content type or a `.toml` suffix;
    /// everything else is read as JSON.
    pub async fn with_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let response = reqwest::get(url)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ConfigError::remote(url, e))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content = response
            .text()
            .await
            .map_err(|e| ConfigError::remote(url, e))?;

        let layer = remote_format(content_type.as_deref(), url).parse(&content)?;
        self.push_layer(layer)?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, e.g.
    /// `HERMES__MIDDLEWARE__STRICT=true`. The plain `STAGE` variable is
    /// honored too, below `PREFIX__STAGE`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if present.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(self)
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Merges every layer, applies environment overrides (if a prefix was
    /// set) and validates the result.
    pub fn load(self) -> Result<HermesConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Finalize without validation.
    pub fn load_unvalidated(mut self) -> Result<HermesConfig, ConfigError> {
        let mut merged = serde_json::to_value(&self.base)?;
        for layer in self.layers.drain(..) {
            merge(&mut merged, layer);
        }
        let mut config: HermesConfig = serde_json::from_value(merged)?;

        if let Some(prefix) = self.env_prefix.take() {
            if let Ok(stage) = env::var(crate::stage::STAGE_ENV) {
                config.stage = Stage::parse_or_default(&stage);
            }
            let scoped = format!("{prefix}__");
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&scoped))
                .collect();
            for (key, value) in vars {
                apply_env_var(&mut config, &key, &value, &prefix)?;
            }
        }

        Ok(config)
    }

    fn push_layer(&mut self, layer: Value) -> Result<(), ConfigError> {
        if !layer.is_object() {
            return Err(ConfigError::validation_error(
                "configuration source must be an object",
            ));
        }
        self.layers.push(layer);
        Ok(())
    }
}

fn remote_format(content_type: Option<&str>, url: &str) -> Format {
    let by_type = content_type.is_some_and(|value| value.contains("toml"));
    let by_suffix = url
        .split(['?', '#'])
        .next()
        .is_some_and(|path| path.ends_with(".toml"));
    if by_type || by_suffix {
        Format::Toml
    } else {
        Format::Json
    }
}

// Objects merge key by key; anything else replaces.
fn merge(target: &mut Value, layer: Value) {
    match (target, layer) {
        (Value::Object(target), Value::Object(layer)) => {
            for (key, value) in layer {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, layer) => *target = layer,
    }
}

// Apply a single environment variable
fn apply_env_var(
    config: &mut HermesConfig,
    key: &str,
    value: &str,
    prefix: &str,
) -> Result<(), ConfigError> {
    let key_without_prefix = key
        .strip_prefix(prefix)
        .and_then(|k| k.strip_prefix("__"))
        .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

    let parts: Vec<&str> = key_without_prefix.split("__").collect();

    match parts.as_slice() {
        ["STAGE"] => {
            config.stage = value
                .parse()
                .map_err(|_| ConfigError::env_parse_error(key, "expected a stage name"))?;
        }

        // Logging section
        ["LOGGING", "ENABLED"] => config.logging.enabled = bool_var(key, value)?,
        ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
        ["LOGGING", "JSON_FORMAT"] => config.logging.json_format = bool_var(key, value)?,
        ["LOGGING", "SERVICE_NAME"] => config.logging.service_name = value.to_string(),

        // Middleware section
        ["MIDDLEWARE", "STRICT"] => {
            config.middleware.strict = if value.is_empty() {
                None
            } else {
                Some(bool_var(key, value)?)
            };
        }
        ["MIDDLEWARE", "CORS", "ALLOW_ORIGIN"] => {
            config.middleware.cors.allow_origin = value.to_string();
        }
        ["MIDDLEWARE", "CORS", "ALLOW_HEADERS"] => {
            config.middleware.cors.allow_headers = value.to_string();
        }
        ["MIDDLEWARE", "CORS", "ALLOW_CREDENTIALS"] => {
            config.middleware.cors.allow_credentials = bool_var(key, value)?;
        }

        // Tracer section
        ["TRACER", "ROUTE"] => config.tracer.route = value.to_string(),
        ["TRACER", "SYSTEM"] => config.tracer.system = value.to_string(),
        ["TRACER", "QUEUE_NAME"] => config.tracer.queue_name = value.to_string(),
        ["TRACER", "REGION"] => {
            config.tracer.region = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }

        // Temp-file section
        ["TEMP_FILE", "PREFIX"] => config.temp_file.prefix = value.to_string(),
        ["TEMP_FILE", "LOCATION"] => config.temp_file.location = value.to_string(),

        // Unknown key - ignore
        _ => {}
    }

    Ok(())
}

fn bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, HermesConfig::default());
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.stage, Stage::Release);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_layers_merge_deeply() {
        let config = ConfigLoader::new()
            .with_development()
            .with_string(
                r#"
                [middleware.cors]
                allow_origin = "https://app.example"
                "#,
                "toml",
            )
            .unwrap()
            .with_value(json!({"middleware": {"strict": true}}))
            .unwrap()
            .load()
            .unwrap();

        // Preset survives, both layers apply.
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.middleware.cors.allow_origin, "https://app.example");
        assert_eq!(config.middleware.cors.allow_headers, "X-Version");
        assert_eq!(config.middleware.strict, Some(true));
    }

    #[test]
    fn test_later_layer_wins() {
        let config = ConfigLoader::new()
            .with_string(r#"{"stage": "alpha"}"#, "json")
            .unwrap()
            .with_value(json!({"stage": "rc"}))
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.stage, Stage::Rc);
    }

    #[test]
    fn test_unknown_field_rejected_at_load() {
        let result = ConfigLoader::new()
            .with_value(json!({"middleware": {"strictness": true}}))
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_non_object_layer_rejected() {
        assert!(ConfigLoader::new().with_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigLoader::new().with_string("stage: test", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "stage = \"test\"\n[temp_file]\nprefix = \"upload-\"").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.stage, Stage::Test);
        assert_eq!(config.temp_file.prefix, "upload-");
        assert_eq!(config.temp_file.location, "/tmp");
        assert!(config.strict());
    }

    #[test]
    fn test_loader_with_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"tracer": {{"route": "/users", "queue_name": "trace"}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.tracer.route, "/users");
        assert!(config.tracer.is_configured());
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/hermes.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/hermes.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, HermesConfig::default());
    }

    #[tokio::test]
    async fn test_with_url_unreachable() {
        let result = ConfigLoader::new()
            .with_url("http://127.0.0.1:9/hermes.json")
            .await;
        assert!(matches!(result, Err(ConfigError::Remote { .. })));
    }

    #[test]
    fn test_remote_format_detection() {
        assert_eq!(remote_format(Some("application/toml"), "https://c/x"), Format::Toml);
        assert_eq!(remote_format(None, "https://c/hermes.toml?v=2"), Format::Toml);
        assert_eq!(remote_format(Some("application/json"), "https://c/x"), Format::Json);
        assert_eq!(remote_format(None, "https://c/config"), Format::Json);
    }

    #[test]
    fn test_merge_replaces_scalars_and_arrays() {
        let mut target = json!({"a": {"b": 1, "c": [1, 2]}, "d": 1});
        merge(&mut target, json!({"a": {"c": [3]}, "e": true}));
        assert_eq!(target, json!({"a": {"b": 1, "c": [3]}, "d": 1, "e": true}));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    // Overrides are exercised through `apply_env_var` directly so tests do
    // not race on the process environment.

    #[test]
    fn test_apply_env_var_stage() {
        let mut config = HermesConfig::default();
        apply_env_var(&mut config, "TEST__STAGE", "test", "TEST").unwrap();
        assert_eq!(config.stage, Stage::Test);
        assert!(apply_env_var(&mut config, "TEST__STAGE", "prod", "TEST").is_err());
    }

    #[test]
    fn test_apply_env_var_middleware() {
        let mut config = HermesConfig::default();
        apply_env_var(&mut config, "TEST__MIDDLEWARE__STRICT", "yes", "TEST").unwrap();
        apply_env_var(&mut config, "TEST__MIDDLEWARE__CORS__ALLOW_CREDENTIALS", "false", "TEST")
            .unwrap();
        assert_eq!(config.middleware.strict, Some(true));
        assert!(!config.middleware.cors.allow_credentials);

        apply_env_var(&mut config, "TEST__MIDDLEWARE__STRICT", "", "TEST").unwrap();
        assert_eq!(config.middleware.strict, None);
    }

    #[test]
    fn test_apply_env_var_sections() {
        let mut config = HermesConfig::default();
        apply_env_var(&mut config, "TEST__LOGGING__LEVEL", "debug", "TEST").unwrap();
        apply_env_var(&mut config, "TEST__TRACER__QUEUE_NAME", "trace-q", "TEST").unwrap();
        apply_env_var(&mut config, "TEST__TRACER__REGION", "eu-west-1", "TEST").unwrap();
        apply_env_var(&mut config, "TEST__TEMP_FILE__LOCATION", "/var/tmp", "TEST").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.tracer.queue_name, "trace-q");
        assert_eq!(config.tracer.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.temp_file.location, "/var/tmp");
    }

    #[test]
    fn test_apply_env_var_invalid_boolean() {
        let mut config = HermesConfig::default();
        let result = apply_env_var(&mut config, "TEST__LOGGING__ENABLED", "sometimes", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut config = HermesConfig::default();
        apply_env_var(&mut config, "TEST__NOPE", "1", "TEST").unwrap();
        assert_eq!(config, HermesConfig::default());
    }
}
