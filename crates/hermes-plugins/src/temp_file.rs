//! Per-invocation temporary file names with cleanup.

use hermes_config::TempFileConfig;
use hermes_core::{Context, HermesResult, HookContext, Plugin};
use rand::Rng;
use std::path::{Path, PathBuf};

/// Paths handed out during the current invocation.
#[derive(Debug, Default)]
struct Generated(Vec<PathBuf>);

/// Fragment contributed by [`TempFilePlugin`].
#[derive(Debug, Clone)]
pub struct TempFileAux {
    /// Hands out file names.
    pub temp_files: TempFiles,
}

/// Generates unique temp file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFiles {
    prefix: String,
    location: String,
}

impl TempFiles {
    /// Returns a fresh `{location}/{prefix}{millis}-{n}` path and records it
    /// for removal when the invocation ends. The file is not created.
    pub fn generate<C: ?Sized>(&self, ctx: &Context<C>) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        let n: u32 = rand::thread_rng().gen_range(0..10_000);
        let path = PathBuf::from(format!("{}/{}{millis}-{n}", self.location, self.prefix));
        tracing::debug!(path = %path.display(), "temp file generated");
        ctx.slots()
            .with_or_default(|generated: &mut Generated| generated.0.push(path.clone()));
        path
    }

    /// The directory files are placed in.
    pub fn location(&self) -> &Path {
        Path::new(&self.location)
    }
}

/// Hands out temp file names and removes the files after each invocation.
#[derive(Debug, Clone)]
pub struct TempFilePlugin {
    prefix: String,
    location: String,
}

impl Default for TempFilePlugin {
    fn default() -> Self {
        Self::from_config(&TempFileConfig::default())
    }
}

impl TempFilePlugin {
    /// Uses `temp-` in `/tmp`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the `temp_file` config section.
    pub fn from_config(config: &TempFileConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            location: config.location.clone(),
        }
    }

    /// Sets the file name prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the directory.
    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

impl Plugin for TempFilePlugin {
    type Aux = TempFileAux;

    fn name(&self) -> &'static str {
        "temp-file"
    }

    async fn create(&self) -> HermesResult<TempFileAux> {
        let exists = tokio::fs::try_exists(&self.location).await.unwrap_or(false);
        tracing::debug!(location = %self.location, exists, "temp file location");
        Ok(TempFileAux {
            temp_files: TempFiles {
                prefix: self.prefix.clone(),
                location: self.location.clone(),
            },
        })
    }

    async fn end(&self, ctx: &HookContext) -> HermesResult<()> {
        let generated = ctx
            .slots()
            .remove::<Generated>()
            .map(|generated| generated.0)
            .unwrap_or_default();
        for path in &generated {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                continue;
            }
            if let Err(error) = tokio::fs::remove_file(path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "failed to remove temp file"
                );
            }
        }
        tracing::debug!(count = generated.len(), "temp files cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{
        AuxNil, Capabilities, HandlerRequest, HandlerResponse, InvocationId, InvocationSlots,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn hook_context() -> HookContext {
        let aux: Arc<dyn Capabilities> = Arc::new(AuxNil);
        Context::new(
            InvocationId::new(),
            Arc::new(HandlerRequest::new(json!({}), json!({}))),
            Arc::new(HandlerResponse::new(Box::new(|_| {}))),
            aux,
            Arc::new(InvocationSlots::new()),
        )
    }

    #[tokio::test]
    async fn test_name_format() {
        let plugin = TempFilePlugin::new().prefix("upload-").location("/var/tmp");
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context();

        let path = aux.temp_files.generate(&ctx);
        let name = path.to_str().unwrap();
        let rest = name.strip_prefix("/var/tmp/upload-").unwrap();
        let (millis, n) = rest.split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert!(n.parse::<u32>().unwrap() < 10_000);
    }

    #[tokio::test]
    async fn test_end_removes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = TempFilePlugin::new().location(dir.path().to_str().unwrap());
        let aux = plugin.create().await.unwrap();
        let ctx = hook_context();

        let written = aux.temp_files.generate(&ctx);
        std::fs::write(&written, b"data").unwrap();
        let never_written = aux.temp_files.generate(&ctx);

        plugin.end(&ctx).await.unwrap();

        assert!(!written.exists());
        assert!(!never_written.exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_end_only_touches_own_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = TempFilePlugin::new().location(dir.path().to_str().unwrap());
        let aux = plugin.create().await.unwrap();
        let first = hook_context();
        let second = hook_context();

        let kept = aux.temp_files.generate(&second);
        std::fs::write(&kept, b"still in use").unwrap();

        plugin.end(&first).await.unwrap();
        assert!(kept.exists());
        plugin.end(&second).await.unwrap();
        assert!(!kept.exists());
    }

    #[test]
    fn test_from_config_defaults() {
        let plugin = TempFilePlugin::from_config(&TempFileConfig::default());
        assert_eq!(plugin.prefix, "temp-");
        assert_eq!(plugin.location, "/tmp");
    }
}
