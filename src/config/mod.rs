//! Configuration module for the forum archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use forum_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("forum.toml")).unwrap();
//! println!("Archiving {} sections", config.sections.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, ForumConfig, MediaConfig, OutputConfig, SectionEntry};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config,
    parse_section_indices, select_sections,
};
pub use validation::{delay_ms_from_secs, validate};
