//! Remote access for logreach
//!
//! This crate builds safely-quoted remote shell commands, executes them over
//! SSH, classifies remote paths, and caches fetched byte payloads in memory.

mod cache;
mod classify;
mod command;
mod exec;

pub use cache::{ByteCache, CacheKey};
pub use classify::{classify, name_extensions_for, ExtensionFilter, IMAGE_EXTENSIONS, TEXT_EXTENSIONS};
pub use command::{build_cat, build_list, sh_quote, COMMAND_LINE_CEILING};
pub use exec::{ExecOutput, RemoteExec, SshExecutor};

// Re-export types used in our public API
pub use logreach_types::{PathType, RemoteError, RemoteTarget};
