//! URL handling module for the forum archiver
//!
//! This module resolves raw links into absolute URLs and classifies them
//! against the forum's query-string URL scheme (thread, section, offset).

mod classify;
mod matcher;
mod normalize;

// Re-export main functions
pub use classify::{classify, page_number, query_param, thread_url, UrlClass, DENY_PATTERNS};
pub use matcher::matches_wildcard;
pub use normalize::normalize;
