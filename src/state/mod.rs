//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Ledger`: per-section discovered threads and completed threads/pages
//! - `SectionState`: the ledger entry of one section
//! - `OrderedSet`: insertion-ordered set serialized as a JSON array
//!
//! Both the ledger and the media reference index are whole JSON documents
//! written through [`write_json_atomic`].

mod ledger;
mod ordered;

// Re-export main types
pub use ledger::{Ledger, SectionState, ThreadRef};
pub use ordered::OrderedSet;

use crate::ArchiveError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Writes a JSON document by writing a sibling temp file and renaming it
/// over the target, so readers only ever see a complete document.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    let data = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp_path, &data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Reads a JSON document; a missing file yields the default value
///
/// An existing file that cannot be read or parsed is a
/// [`ArchiveError::Persistence`] error.
pub fn read_json_document<T: DeserializeOwned + Default>(path: &Path) -> crate::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(ArchiveError::Persistence {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    serde_json::from_str(&content).map_err(|e| ArchiveError::Persistence {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
