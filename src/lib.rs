//! Forum Archiver: an offline mirror builder for paginated forums
//!
//! This crate crawls the sections of a forum, saves every thread page as a
//! self-contained HTML file with its images inlined, and keeps a resumable
//! progress ledger. A separate pass scans the saved archive for embedded
//! video references and drives an external downloader over them.

pub mod archive;
pub mod assets;
pub mod config;
pub mod crawler;
pub mod media;
pub mod output;
pub mod render;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archiver operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable state file {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Archive directory not found: {0}")]
    CorpusMissing(PathBuf),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Section index {index} out of range (0..{count})")]
    SectionIndex { index: usize, count: usize },
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
pub(crate) async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// Re-export commonly used types
pub use config::Config;
pub use state::{Ledger, SectionState};
pub use crate::url::{classify, normalize, page_number, UrlClass};
