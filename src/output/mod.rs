//! Output module for end-of-run reports
//!
//! This module handles:
//! - Crawl summaries with per-section progress bars and outcome tallies
//! - Media pass summaries and the scan-only reference report
//! - The numbered section list

mod summary;

pub use summary::{
    format_crawl_summary, format_media_summary, format_scan_report, format_section_list,
    print_crawl_summary, print_media_summary, print_scan_report, print_sections, progress_bar,
    CrawlSummary, MediaSummary, MediaTally, SectionTally,
};
