//! Staging levels.
//!
//! A deployment runs at one [`Stage`]. The stage decides defaults elsewhere:
//! `test` turns strict mode on, `release` lowers the default log verbosity.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Environment variable holding the current stage.
pub const STAGE_ENV: &str = "STAGE";

/// Deployment staging level, ordered from least to most production-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Automated tests.
    Test,
    /// A developer machine.
    #[default]
    Local,
    /// Shared development deployment.
    Alpha,
    /// Pre-production deployment.
    Beta,
    /// Release candidate.
    Rc,
    /// Production.
    Release,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Self; 6] = [
        Self::Test,
        Self::Local,
        Self::Alpha,
        Self::Beta,
        Self::Rc,
        Self::Release,
    ];

    /// Reads the stage from `STAGE`, falling back to [`Stage::Local`].
    #[must_use]
    pub fn current() -> Self {
        env::var(STAGE_ENV)
            .map(|value| Self::parse_or_default(&value))
            .unwrap_or_default()
    }

    /// Parses a stage name, falling back to [`Stage::Local`] when unknown.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Local => "local",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
            Self::Release => "release",
        }
    }

    /// `test`, `local` or `alpha`.
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Test | Self::Local | Self::Alpha)
    }

    /// `beta`, `rc` or `release`.
    pub const fn is_real(self) -> bool {
        matches!(self, Self::Beta | Self::Rc | Self::Release)
    }

    /// Every stage except `rc` and `release`.
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Test | Self::Local | Self::Alpha | Self::Beta)
    }

    /// Strict mode default for this stage.
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Test)
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ConfigError::invalid_value("stage", format!("unknown stage `{s}`")))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
