//! Named, leveled loggers as a capability.
//!
//! A [`Logger`] filters by its own [`LogLevel`] before handing the event to
//! `tracing`, so one noisy component can be turned down without touching the
//! global filter.

use hermes_config::Stage;
use hermes_core::{HermesError, HermesResult, Plugin};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable holding the default level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Verbosity of a [`Logger`], from silent to everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Nothing.
    Off,
    /// Unrecoverable failures.
    Fatal,
    /// Failures.
    Error,
    /// Suspicious conditions.
    Warn,
    /// Milestones.
    Info,
    /// Diagnostics.
    Debug,
    /// Fine-grained diagnostics.
    Trace,
    /// Everything, including object dumps.
    All,
}

impl LogLevel {
    /// Every level, quietest first.
    pub const ALL_LEVELS: [Self; 8] = [
        Self::Off,
        Self::Fatal,
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Trace,
        Self::All,
    ];

    /// Numeric severity; a logger emits a message when its own severity is
    /// at least the message's.
    pub const fn severity(self) -> u16 {
        match self {
            Self::Off => 0,
            Self::Fatal => 100,
            Self::Error => 200,
            Self::Warn => 300,
            Self::Info => 400,
            Self::Debug => 500,
            Self::Trace => 600,
            Self::All => 1000,
        }
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::All => "all",
        }
    }

    /// Default for a stage: `info` in release, `debug` elsewhere.
    pub const fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Release => Self::Info,
            _ => Self::Debug,
        }
    }

    /// `LOG_LEVEL` when it names a level, else the default for the current
    /// stage.
    pub fn current() -> Self {
        std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| Self::for_stage(Stage::current()))
    }
}

impl FromStr for LogLevel {
    type Err = HermesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_LEVELS
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HermesError::validation(format!("unknown log level: {s}")))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named logger with its own level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: Arc<str>,
    level: LogLevel,
}

impl Logger {
    /// Creates a logger.
    pub fn new(name: impl Into<Arc<str>>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    /// The logger's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The logger's level.
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether a message at `level` would be emitted.
    pub const fn enabled(&self, level: LogLevel) -> bool {
        !matches!(level, LogLevel::Off) && self.level.severity() >= level.severity()
    }

    /// Logs at `level`. Returns whether the message passed this logger's
    /// filter.
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) -> bool {
        if !self.enabled(level) {
            return false;
        }
        let logger = &*self.name;
        match level {
            LogLevel::Off => {}
            LogLevel::Fatal => tracing::error!(logger, fatal = true, "{message}"),
            LogLevel::Error => tracing::error!(logger, "{message}"),
            LogLevel::Warn => tracing::warn!(logger, "{message}"),
            LogLevel::Info => tracing::info!(logger, "{message}"),
            LogLevel::Debug => tracing::debug!(logger, "{message}"),
            LogLevel::Trace | LogLevel::All => tracing::trace!(logger, "{message}"),
        }
        true
    }

    /// Logs at `fatal`.
    pub fn fatal(&self, message: impl fmt::Display) -> bool {
        self.log(LogLevel::Fatal, message)
    }

    /// Logs at `error`.
    pub fn error(&self, message: impl fmt::Display) -> bool {
        self.log(LogLevel::Error, message)
    }

    /// Logs at `warn`.
    pub fn warn(&self, message: impl fmt::Display) -> bool {
        self.log(LogLevel::Warn, message)
    }

    /// Logs at `info`.
    pub fn info(&self, message: impl fmt::Display) -> bool {
        self.log(LogLevel::Info, message)
    }

    /// Logs at `debug`.
    pub fn debug(&self, message: impl fmt::Display) -> bool {
        self.log(LogLevel::Debug, message)
    }

    /// Logs at `trace`.
    pub fn trace(&self, message: impl fmt::Display) -> bool {
        self.log(LogLevel::Trace, message)
    }

    /// Dumps `object` as JSON at `all`.
    pub fn all<T: Serialize + ?Sized>(&self, message: impl fmt::Display, object: &T) -> bool {
        if !self.enabled(LogLevel::All) {
            return false;
        }
        let dump = serde_json::to_string(object)
            .unwrap_or_else(|e| format!("<unserializable: {e}>"));
        self.log(LogLevel::All, format_args!("{message}: {dump}"))
    }
}

/// Fragment contributed by [`LoggerPlugin`].
#[derive(Debug, Clone)]
pub struct LoggerAux {
    /// The configured logger.
    pub logger: Logger,
}

/// Contributes a named [`Logger`].
#[derive(Debug, Clone)]
pub struct LoggerPlugin {
    name: String,
    level: Option<LogLevel>,
}

impl LoggerPlugin {
    /// Logger named `name` at the default level.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
        }
    }

    /// Pins the level instead of using [`LogLevel::current`].
    #[must_use]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }
}

impl Plugin for LoggerPlugin {
    type Aux = LoggerAux;

    fn name(&self) -> &'static str {
        "logger"
    }

    async fn create(&self) -> HermesResult<LoggerAux> {
        let level = self.level.unwrap_or_else(LogLevel::current);
        tracing::debug!(logger = %self.name, level = level.as_str(), "logger created");
        Ok(LoggerAux {
            logger: Logger::new(self.name.as_str(), level),
        })
    }
}
