//! Walks the saved archive for video references

use crate::archive::ArchiveLayout;
use crate::media::extract::extract_media_ids;
use crate::media::index::ReferenceIndex;
use crate::state::OrderedSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// References found in one section directory
#[derive(Debug, Clone, Default)]
pub struct SectionScan {
    pub section: String,

    /// Pages scanned
    pub files: usize,

    /// Identifiers in first-seen order
    pub video_ids: OrderedSet,

    /// Archive-relative page path and the identifiers it references
    pub pages: Vec<(String, Vec<String>)>,
}

/// Scans each section directory and merges the references into `index`
///
/// Files ending `.html` or `.htm` are read recursively in name order.
/// Source paths are relative to the archive root with `/` separators.
pub fn scan_sections(
    layout: &ArchiveLayout,
    sections: &[String],
    index: &mut ReferenceIndex,
) -> crate::Result<Vec<SectionScan>> {
    let mut scans = Vec::with_capacity(sections.len());

    for section in sections {
        let scan = scan_section(layout, section)?;
        let mut new_ids = 0;
        for (source, ids) in &scan.pages {
            for id in ids {
                if index.add_reference(id, section, source) {
                    new_ids += 1;
                }
            }
        }

        info!(
            section = %section,
            files = scan.files,
            videos = scan.video_ids.len(),
            new = new_ids,
            "Scanned section"
        );
        scans.push(scan);
    }

    Ok(scans)
}

/// Scans one section directory; a missing directory yields no references
pub fn scan_section(layout: &ArchiveLayout, section: &str) -> crate::Result<SectionScan> {
    let mut scan = SectionScan {
        section: section.to_string(),
        ..SectionScan::default()
    };

    let dir = layout.section_dir(section);
    if !dir.is_dir() {
        debug!(section, dir = %dir.display(), "Section not in archive");
        return Ok(scan);
    }

    let mut files = Vec::new();
    collect_pages(&dir, &mut files)?;

    for path in files {
        let markup = match std::fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read saved page");
                continue;
            }
        };
        scan.files += 1;

        let ids = extract_media_ids(&markup);
        if ids.is_empty() {
            continue;
        }
        for id in &ids {
            scan.video_ids.insert(id.as_str());
        }
        scan.pages.push((relative_source(layout.root(), &path), ids));
    }

    Ok(scan)
}

fn collect_pages(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_pages(&path, files)?;
        } else if is_page(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

fn relative_source(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
