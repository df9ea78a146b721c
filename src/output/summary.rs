//! End-of-run summaries
//!
//! Tallies are collected by the crawl and media passes and rendered as
//! plain-text tables on stdout.

use crate::assets::EmbedStats;
use crate::config::SectionEntry;
use crate::media::{MediaStatus, ReferenceIndex};

const BAR_WIDTH: usize = 20;

/// Outcome counts of one section's crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTally {
    pub name: String,

    /// Threads in the frozen discovered list
    pub discovered: usize,

    /// Threads the ledger records as complete
    pub completed: usize,

    /// Listing pages rendered during discovery
    pub listing_renders: usize,

    /// Threads saved during this run
    pub threads_saved: usize,

    /// Page files written during this run
    pub pages_saved: usize,

    /// Page files already present with a plausible size
    pub pages_existing: usize,

    /// Threads marked complete from files already on disk
    pub healed: usize,

    /// Threads already complete in the ledger
    pub skipped: usize,

    pub render_failures: usize,
    pub write_failures: usize,

    /// Asset embedding tallies over all pages of the section
    pub assets: EmbedStats,
}

impl SectionTally {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Percentage of discovered threads that are complete
    pub fn percent(&self) -> f64 {
        if self.discovered == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.discovered as f64) * 100.0
    }

    fn add(&mut self, other: &SectionTally) {
        self.discovered += other.discovered;
        self.completed += other.completed;
        self.listing_renders += other.listing_renders;
        self.threads_saved += other.threads_saved;
        self.pages_saved += other.pages_saved;
        self.pages_existing += other.pages_existing;
        self.healed += other.healed;
        self.skipped += other.skipped;
        self.render_failures += other.render_failures;
        self.write_failures += other.write_failures;
        self.assets.merge(&other.assets);
    }
}

/// Result of a crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub sections: Vec<SectionTally>,

    /// True when the run was stopped by the operator
    pub interrupted: bool,
}

impl CrawlSummary {
    /// Sum over all sections
    pub fn totals(&self) -> SectionTally {
        let mut totals = SectionTally::new("TOTAL");
        for section in &self.sections {
            totals.add(section);
        }
        totals
    }

    pub fn section(&self, name: &str) -> Option<&SectionTally> {
        self.sections.iter().find(|tally| tally.name == name)
    }
}

/// Outcome counts of one section's media pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaTally {
    pub name: String,

    /// Identifiers referenced from the section
    pub referenced: usize,

    pub downloaded: usize,

    /// Identifiers not attempted (terminal, or over the per-section cap)
    pub skipped: usize,

    pub unavailable: usize,
    pub failed: usize,
}

impl MediaTally {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn add(&mut self, other: &MediaTally) {
        self.referenced += other.referenced;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.unavailable += other.unavailable;
        self.failed += other.failed;
    }
}

/// Result of a media pass
#[derive(Debug, Clone, Default)]
pub struct MediaSummary {
    pub sections: Vec<MediaTally>,

    /// Only scanned, nothing was resolved
    pub scan_only: bool,

    pub interrupted: bool,
}

impl MediaSummary {
    pub fn totals(&self) -> MediaTally {
        let mut totals = MediaTally::new("TOTAL");
        for section in &self.sections {
            totals.add(section);
        }
        totals
    }

    pub fn section(&self, name: &str) -> Option<&MediaTally> {
        self.sections.iter().find(|tally| tally.name == name)
    }
}

/// Draws a fixed-width progress bar such as `[#####---------------]`
pub fn progress_bar(done: usize, total: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (done.min(total) * BAR_WIDTH) / total
    };
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Formats the crawl summary
pub fn format_crawl_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();

    out.push_str("\n=== Crawl Summary ===\n");
    if summary.interrupted {
        out.push_str("(interrupted, progress saved)\n");
    }
    out.push('\n');

    for tally in &summary.sections {
        out.push_str(&format!(
            "{} {} {}/{} ({:.1}%)\n",
            progress_bar(tally.completed, tally.discovered),
            tally.name,
            tally.completed,
            tally.discovered,
            tally.percent()
        ));
        out.push_str(&format!(
            "    saved: {} threads, {} pages ({} already present) | healed: {} | skipped: {}\n",
            tally.threads_saved,
            tally.pages_saved,
            tally.pages_existing,
            tally.healed,
            tally.skipped
        ));
        out.push_str(&format!(
            "    failures: {} render, {} write | images: {} captured, {} fetched | misses: {}\n",
            tally.render_failures,
            tally.write_failures,
            tally.assets.images_transport,
            tally.assets.images_fallback,
            tally.assets.misses()
        ));
    }

    let totals = summary.totals();
    out.push_str(&format!(
        "\nTotal: {}/{} threads complete ({:.1}%), {} pages written, {} images embedded\n",
        totals.completed,
        totals.discovered,
        totals.percent(),
        totals.pages_saved,
        totals.assets.images()
    ));

    out
}

/// Prints the crawl summary to stdout
pub fn print_crawl_summary(summary: &CrawlSummary) {
    print!("{}", format_crawl_summary(summary));
}

/// Formats the media pass summary
pub fn format_media_summary(summary: &MediaSummary) -> String {
    let mut out = String::new();

    out.push_str("\n=== Media Summary ===\n");
    if summary.interrupted {
        out.push_str("(interrupted, index saved)\n");
    }
    out.push('\n');
    out.push_str(&format!(
        "{:<40} {:>10} {:>10} {:>8} {:>11} {:>7}\n",
        "Section", "Referenced", "Downloaded", "Skipped", "Unavailable", "Failed"
    ));

    let totals = summary.totals();
    for tally in summary.sections.iter().chain(std::iter::once(&totals)) {
        out.push_str(&format!(
            "{:<40} {:>10} {:>10} {:>8} {:>11} {:>7}\n",
            truncate(&tally.name, 40),
            tally.referenced,
            tally.downloaded,
            tally.skipped,
            tally.unavailable,
            tally.failed
        ));
    }

    out
}

/// Prints the media pass summary to stdout
pub fn print_media_summary(summary: &MediaSummary) {
    print!("{}", format_media_summary(summary));
}

/// Formats the numbered section list
pub fn format_section_list(sections: &[SectionEntry]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Configured sections ({}):\n", sections.len()));
    for (index, section) in sections.iter().enumerate() {
        out.push_str(&format!("  [{:>2}] {}\n", index, section.name));
        out.push_str(&format!("       {}\n", section.url));
    }
    out
}

/// Prints the numbered section list to stdout
pub fn print_sections(sections: &[SectionEntry]) {
    print!("{}", format_section_list(sections));
}

/// Source files listed per identifier in the scan report
const REPORT_SOURCES: usize = 3;

/// Formats the scan-only report: identifiers per section with their sources
pub fn format_scan_report(index: &ReferenceIndex, sections: &[String]) -> String {
    let mut out = String::new();
    out.push_str("\n=== Video References ===\n");

    for section in sections {
        let entries: Vec<_> = index.entries_for_section(section).collect();
        out.push_str(&format!("\n{} ({} videos)\n", section, entries.len()));

        for (id, entry) in entries {
            let marker = match entry.status {
                MediaStatus::Pending => " ",
                MediaStatus::Downloaded => "+",
                MediaStatus::Unavailable => "x",
                MediaStatus::Failed => "!",
            };
            out.push_str(&format!("  {} {} {}\n", marker, id, entry.url));
            for source in entry.source_pages.iter().take(REPORT_SOURCES) {
                out.push_str(&format!("      {}\n", source));
            }
            let more = entry.source_pages.len().saturating_sub(REPORT_SOURCES);
            if more > 0 {
                out.push_str(&format!("      ... and {} more\n", more));
            }
        }
    }

    out.push_str(&format!("\n{} unique videos in index\n", index.len()));
    out
}

/// Prints the scan-only report to stdout
pub fn print_scan_report(index: &ReferenceIndex, sections: &[String]) {
    print!("{}", format_scan_report(index, sections));
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
