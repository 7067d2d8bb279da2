//! Local log processing for logreach
//!
//! This crate provides the backward block tail reader and the streaming
//! line search engine.

mod search;
mod tail;

pub use search::{search, SearchOutcome};
pub use tail::tail;

// Re-export types used in our public API
pub use logreach_types::{SearchOptions, SearchResult};
