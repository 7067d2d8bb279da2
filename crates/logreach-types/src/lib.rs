//! Shared types for logreach
//!
//! This crate contains data structures and the error taxonomy used across
//! multiple logreach crates.

use serde::{Deserialize, Serialize};

// ============================================================================
// Log Sources & Remote Targets
// ============================================================================

/// A named local log file registered in the configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogSource {
    pub name: String,
    pub path: String,
}

impl LogSource {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Remote-shell protocol of a stored profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ssh,
    Ftp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Ftp => "ftp",
        }
    }

    /// Default port for the protocol
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Ssh => 22,
            Self::Ftp => 21,
        }
    }
}

/// A remote host reachable with stored credentials
///
/// Owned by the external persistence collaborator; the core only reads it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub id: u64,
    #[serde(default)]
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl RemoteTarget {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Filter Chains
// ============================================================================

/// An ordered sequence of plain-text filter expressions applied successively
/// to remote command output. Empty stages are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChain(Vec<String>);

impl FilterChain {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a chain from raw stages, silently dropping empty ones
    pub fn from_stages<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            stages
                .into_iter()
                .map(|s| s.into().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Split a registered path on `| grep` pipeline segments.
    ///
    /// Returns the base pattern and the grep chain. Non-grep segments are
    /// discarded for safety.
    pub fn split_registered(raw: &str) -> (String, Self) {
        let mut parts = raw.split('|').map(str::trim);
        let base = parts.next().unwrap_or("").to_string();
        let stages = parts
            .filter_map(|seg| {
                let lower = seg.to_lowercase();
                lower
                    .starts_with("grep")
                    .then(|| seg[4..].trim().to_string())
            })
            .filter(|s| !s.is_empty());
        (base, Self::from_stages(stages))
    }

    /// Append `other`'s stages after this chain's own
    pub fn extend(&mut self, other: &Self) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn stages(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ============================================================================
// Search Types
// ============================================================================

/// Options for a streaming line search
#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Interpret the query as a regular expression
    pub use_regex: bool,

    /// Match case-sensitively (substring mode) or without `(?i)` (regex mode)
    pub case_sensitive: bool,

    /// Number of immediately preceding lines attached to each match
    pub context_lines: usize,

    /// Stop after this many matches
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            use_regex: false,
            case_sensitive: false,
            context_lines: 0,
            limit: 5000,
        }
    }
}

/// One matched line with optional leading context, in file order
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// 1-based line number
    pub line: u64,

    /// The matched line text
    pub text: String,

    /// Up to `context_lines` lines immediately before the match
    pub context_before: Vec<String>,
}

// ============================================================================
// Path Classification
// ============================================================================

/// Content classification of a remote path or glob
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    Image,
    Text,
}

/// Caller-facing listing kind; `Auto` is resolved once at the service
/// boundary into a concrete [`PathType`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ListKind {
    #[default]
    Auto,
    Text,
    Image,
}

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Failure surfaced by remote connection, authentication or execution
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors crossing the service boundary
///
/// Local file-I/O and remote-shell failures are all translated into one of
/// these kinds; nothing lower-level escapes the service.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// Unknown log name, profile id or registered path
    #[error("not found: {0}")]
    NotFound(String),

    /// Empty pattern/path, wrong protocol, unusable parameter
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Connection, authentication, timeout or non-zero remote exit
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Remote byte fetch exceeded the configured ceiling
    #[error("payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Local I/O failure not swallowed by a tolerant operation
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_chain_drops_empty_stages() {
        let chain = FilterChain::from_stages(["ERROR", "  ", "", "timeout"]);
        assert_eq!(chain.stages(), ["ERROR", "timeout"]);
    }

    #[test]
    fn split_registered_extracts_grep_segments() {
        let (base, chain) =
            FilterChain::split_registered("/var/log/app*.log | grep ERROR | grep -v noise");
        assert_eq!(base, "/var/log/app*.log");
        assert_eq!(chain.stages(), ["ERROR", "-v noise"]);
    }

    #[test]
    fn split_registered_ignores_non_grep_segments() {
        let (base, chain) = FilterChain::split_registered("/tmp/a.log | rm -rf / | grep ok");
        assert_eq!(base, "/tmp/a.log");
        assert_eq!(chain.stages(), ["ok"]);
    }

    #[test]
    fn extend_appends_other_stages() {
        let mut chain = FilterChain::from_stages(["warn"]);
        chain.extend(&FilterChain::from_stages(["ERROR", "timeout"]));
        assert_eq!(chain.stages(), ["warn", "ERROR", "timeout"]);
    }

    #[test]
    fn split_registered_without_pipeline() {
        let (base, chain) = FilterChain::split_registered("/var/log/syslog");
        assert_eq!(base, "/var/log/syslog");
        assert!(chain.is_empty());
    }
}
