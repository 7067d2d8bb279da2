//! Configuration loading
//!
//! The config file is TOML and is re-read on every service call so limit
//! changes take effect without a restart. Missing file or unknown fields
//! fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use logreach_types::{LogSource, RemoteTarget};

/// Default remote command timeout
const DEFAULT_SSH_TIMEOUT_SECS: u64 = 15;

/// Default cache entry time-to-live
const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Default cache byte budget (20 MiB)
const DEFAULT_CACHE_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// Default remote fetch payload ceiling (20 MiB)
const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 20 * 1024 * 1024;

fn default_ssh_timeout() -> u64 {
    DEFAULT_SSH_TIMEOUT_SECS
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_cache_max_bytes() -> u64 {
    DEFAULT_CACHE_MAX_BYTES
}

fn default_max_payload_bytes() -> u64 {
    DEFAULT_MAX_PAYLOAD_BYTES
}

/// Cache limits section
#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_bytes: DEFAULT_CACHE_MAX_BYTES,
        }
    }
}

/// Parsed configuration file
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Remote command timeout in seconds
    #[serde(default = "default_ssh_timeout")]
    pub ssh_timeout_secs: u64,

    /// Remote fetch payload ceiling in bytes
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Registered local logs
    #[serde(default)]
    pub logs: Vec<LogSource>,

    /// Stored remote profiles
    #[serde(default)]
    pub profiles: Vec<RemoteTarget>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_timeout_secs: DEFAULT_SSH_TIMEOUT_SECS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            cache: CacheConfig::default(),
            logs: Vec::new(),
            profiles: Vec::new(),
        }
    }
}

impl Config {
    /// Parse the file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn log_by_name(&self, name: &str) -> Option<&LogSource> {
        self.logs.iter().find(|l| l.name == name)
    }

    pub fn profile_by_id(&self, id: u64) -> Option<&RemoteTarget> {
        self.profiles.iter().find(|p| p.id == id)
    }
}

/// Handle to a config file, re-read on every access
#[derive(Clone, Debug)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Fresh snapshot of the file contents
    pub fn snapshot(&self) -> Result<Config> {
        Config::load(&self.path)
    }
}
