//! The media pass: scan the archive, then resolve pending videos

use crate::archive::{safe_filename, ArchiveLayout};
use crate::config::{select_sections, Config};
use crate::media::extract::canonical_url;
use crate::media::index::ReferenceIndex;
use crate::media::resolver::{MediaResolver, ResolveOutcome, YtDlpResolver};
use crate::media::scan::scan_sections;
use crate::output::{print_scan_report, MediaSummary, MediaTally};
use crate::{wait_for_interrupt, ArchiveError};
use std::time::Duration;
use tracing::{info, warn};

/// Options of one media pass
#[derive(Debug, Clone)]
pub struct MediaOptions {
    /// Section indices; `None` selects all sections
    pub sections: Option<Vec<usize>>,

    /// Scan and report without resolving anything
    pub scan_only: bool,

    /// Maximum resolution attempts per section
    pub max_per_section: Option<usize>,

    /// Reset failed entries to pending before resolving
    pub retry_failed: bool,

    /// Pause after each successful download
    pub pause: Duration,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            sections: None,
            scan_only: false,
            max_per_section: None,
            retry_failed: false,
            pause: Duration::from_secs(1),
        }
    }
}

/// Runs the media pass with the `yt-dlp` resolver
///
/// The executable is checked before any download is attempted; scan-only
/// runs do not need it.
pub async fn run_media(config: &Config, options: &MediaOptions) -> crate::Result<MediaSummary> {
    let resolver = YtDlpResolver::new(&config.media);
    if !options.scan_only {
        let version = resolver.check_available().await?;
        info!(binary = %config.media.binary, version = %version, "Downloader ready");
    }
    run_media_with(config, options, &resolver).await
}

/// Runs the media pass with any resolver
pub async fn run_media_with<M: MediaResolver>(
    config: &Config,
    options: &MediaOptions,
    resolver: &M,
) -> crate::Result<MediaSummary> {
    let archive_dir = &config.output.archive_dir;
    if !archive_dir.is_dir() {
        return Err(ArchiveError::CorpusMissing(archive_dir.clone()));
    }

    let sections: Vec<String> = select_sections(config, options.sections.as_deref())?
        .into_iter()
        .map(|section| section.name)
        .collect();

    let index_path = config.index_path();
    let mut index = ReferenceIndex::load(&index_path)?;

    info!("Scanning {} section(s) for video references", sections.len());
    let layout = ArchiveLayout::new(archive_dir.clone());
    let scans = scan_sections(&layout, &sections, &mut index)?;
    index.persist(&index_path)?;

    let mut summary = MediaSummary {
        sections: scans
            .iter()
            .map(|scan| MediaTally {
                referenced: scan.video_ids.len(),
                ..MediaTally::new(&scan.section)
            })
            .collect(),
        scan_only: options.scan_only,
        interrupted: false,
    };

    if options.scan_only {
        print_scan_report(&index, &sections);
        return Ok(summary);
    }

    if options.retry_failed {
        let reset = index.retry_failed();
        if reset > 0 {
            info!("Retrying {} previously failed video(s)", reset);
            index.persist(&index_path)?;
        }
    }

    let mut interrupted = false;
    'sections: for (scan, tally) in scans.iter().zip(summary.sections.iter_mut()) {
        if scan.video_ids.is_empty() {
            continue;
        }

        let output_dir = config.media.video_dir.join(safe_filename(&scan.section));
        let total = scan.video_ids.len();
        info!(section = %scan.section, videos = total, "=== Section: {} ===", scan.section);

        let mut attempts = 0;
        for (position, video_id) in scan.video_ids.iter().enumerate() {
            let pending = index
                .status(video_id)
                .map(|status| status.is_pending())
                .unwrap_or(false);
            if !pending {
                tally.skipped += 1;
                continue;
            }
            if options.max_per_section.map(|max| attempts >= max).unwrap_or(false) {
                tally.skipped += 1;
                continue;
            }
            attempts += 1;

            std::fs::create_dir_all(&output_dir)?;
            info!("[{}/{}] {}", position + 1, total, canonical_url(video_id));

            let outcome = tokio::select! {
                outcome = resolver.resolve(video_id, &output_dir) => outcome,
                _ = wait_for_interrupt() => {
                    warn!("Interrupted, saving index");
                    interrupted = true;
                    break 'sections;
                }
            };

            match &outcome {
                ResolveOutcome::Downloaded { .. } => {
                    info!(video = %video_id, "Downloaded");
                    tally.downloaded += 1;
                }
                ResolveOutcome::Unavailable(phrase) => {
                    info!(video = %video_id, reason = %phrase, "Unavailable");
                    tally.unavailable += 1;
                }
                ResolveOutcome::Failed(reason) => {
                    warn!(section = %scan.section, video = %video_id, reason = %reason, "Download failed");
                    tally.failed += 1;
                }
            }

            index.record_outcome(video_id, &outcome);
            index.persist(&index_path)?;

            if matches!(outcome, ResolveOutcome::Downloaded { .. }) && !options.pause.is_zero() {
                tokio::time::sleep(options.pause).await;
            }
        }

        info!(
            section = %scan.section,
            "{}: {} new, {} skipped, {} unavailable, {} failed",
            scan.section,
            tally.downloaded,
            tally.skipped,
            tally.unavailable,
            tally.failed
        );
    }

    summary.interrupted = interrupted;
    index.persist(&index_path)?;
    Ok(summary)
}
