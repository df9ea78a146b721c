//! External media pass
//!
//! This module handles:
//! - Extracting YouTube references from saved pages
//! - Merging them into a persistent cross-section reference index
//! - Driving an external downloader over pending references

mod extract;
mod index;
mod resolver;
mod runner;
mod scan;
mod status;

pub use extract::{canonical_url, extract_media_ids, video_id};
pub use index::{ReferenceEntry, ReferenceIndex};
pub use resolver::{classify_output, MediaResolver, ResolveOutcome, YtDlpResolver, UNAVAILABLE_PHRASES};
pub use runner::{run_media, run_media_with, MediaOptions};
pub use scan::{scan_section, scan_sections, SectionScan};
pub use status::MediaStatus;
