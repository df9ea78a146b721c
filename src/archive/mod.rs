//! On-disk layout of the offline archive
//!
//! ```text
//! <archive>/<section>/<id>_<title>.html              single-page thread
//! <archive>/<section>/<id>_<title>/page_<n>.html     multi-page thread
//! ```

use crate::state::ThreadRef;
use std::path::{Path, PathBuf};

/// Files at or below this size are not trusted as saved pages
pub const MIN_PAGE_BYTES: u64 = 200;

/// Maximum length of a sanitized name, in characters
const MAX_NAME_CHARS: usize = 80;

/// Characters that cannot appear in file names on common filesystems
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turns a title into a portable file name component
///
/// Reserved characters become `_`, whitespace runs collapse to one space,
/// the result is cut to 80 characters and trailing dots and spaces are
/// removed. An empty result becomes `_`.
///
/// # Examples
///
/// ```
/// use forum_archiver::archive::safe_filename;
///
/// assert_eq!(safe_filename("What? A <b>poop</b>!"), "What_ A _b_poop__b_!");
/// assert_eq!(safe_filename("  spaced   out ..."), "spaced out");
/// assert_eq!(safe_filename("???"), "___");
/// assert_eq!(safe_filename(""), "_");
/// ```
pub fn safe_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    let trimmed = truncated.trim_end_matches(['.', ' ']);

    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Paths of the archive rooted at one directory
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn section_dir(&self, section: &str) -> PathBuf {
        self.root.join(safe_filename(section))
    }

    fn thread_stem(thread: &ThreadRef) -> String {
        format!("{}_{}", thread.id, safe_filename(&thread.title))
    }

    /// File of a single-page thread
    pub fn thread_file(&self, section: &str, thread: &ThreadRef) -> PathBuf {
        self.section_dir(section)
            .join(format!("{}.html", Self::thread_stem(thread)))
    }

    /// Directory holding the pages of a multi-page thread
    pub fn thread_dir(&self, section: &str, thread: &ThreadRef) -> PathBuf {
        self.section_dir(section).join(Self::thread_stem(thread))
    }

    /// File of page `page_number` (1-based) of a multi-page thread
    pub fn page_file(&self, section: &str, thread: &ThreadRef, page_number: u64) -> PathBuf {
        self.thread_dir(section, thread)
            .join(format!("page_{}.html", page_number))
    }

    /// True when the thread already has a plausible copy on disk
    ///
    /// Either the flat file exists with more than [`MIN_PAGE_BYTES`], or the
    /// thread directory holds at least one page file that large. A
    /// truncated write above the threshold is accepted as complete.
    pub fn is_plausibly_complete(&self, section: &str, thread: &ThreadRef) -> bool {
        if has_plausible_size(&self.thread_file(section, thread)) {
            return true;
        }

        let Ok(entries) = std::fs::read_dir(self.thread_dir(section, thread)) else {
            return false;
        };

        entries.flatten().any(|entry| {
            let path = entry.path();
            let is_page = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("page_") && n.ends_with(".html"))
                .unwrap_or(false);
            is_page && has_plausible_size(&path)
        })
    }
}

/// True when `path` is a file larger than [`MIN_PAGE_BYTES`]
pub fn has_plausible_size(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > MIN_PAGE_BYTES)
        .unwrap_or(false)
}

/// Writes a page in one synchronous call, creating parent directories
pub fn write_page(path: &Path, markup: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, markup)
}
