//! Lookup configuration.
//!
//! Everything has a default, so an empty file (or no file at all) gives the
//! stock behaviour: a five second bound on each socket operation and the
//! usual `(unknown)` / `(not found)` / `(failed)` sentinels.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const UNKNOWN: &str = "(unknown)";
pub const NOT_FOUND: &str = "(not found)";
pub const FAILED: &str = "(failed)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the p0f API socket (`p0f -s <path>`).
    ///
    /// Only used by callers that don't pass a path explicitly.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Bound on the write, and separately on the read, of a lookup.
    ///
    /// Default: 5 seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub sentinels: Sentinels,
}

/// Strings returned in place of an OS name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinels {
    /// p0f knows the host but couldn't tell what it runs.
    #[serde(default = "defaults::unknown")]
    pub unknown: String,

    /// p0f has never seen the host.
    #[serde(default = "defaults::not_found")]
    pub not_found: String,

    /// The lookup itself went wrong.
    #[serde(default = "defaults::failed")]
    pub failed: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout_secs: defaults::timeout_secs(),
            sentinels: Sentinels::default(),
        }
    }
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            unknown: defaults::unknown(),
            not_found: defaults::not_found(),
            failed: defaults::failed(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document isn't valid for this schema.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigIo`] if the file can't be read, or
    /// [`Error::Config`] if it can't be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::ConfigIo)?;
        Self::from_toml_str(&contents)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

mod defaults {
    use crate::transport::DEFAULT_TIMEOUT;

    pub const fn timeout_secs() -> u64 {
        DEFAULT_TIMEOUT.as_secs()
    }

    pub fn unknown() -> String {
        String::from(super::UNKNOWN)
    }

    pub fn not_found() -> String {
        String::from(super::NOT_FOUND)
    }

    pub fn failed() -> String {
        String::from(super::FAILED)
    }
}
