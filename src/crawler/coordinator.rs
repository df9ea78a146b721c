//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the section loop that coordinates:
//! - Restoring and persisting the progress ledger
//! - Listing discovery and freezing of each section's thread list
//! - Rendering, asset embedding and saving of thread pages
//! - Self-healing from files already in the archive
//! - Handling interrupts and producing the end-of-run summary

use crate::archive::{has_plausible_size, write_page, ArchiveLayout};
use crate::assets::{AssetCache, AssetFetcher, AssetPipeline, HttpAssetFetcher};
use crate::config::{select_sections, Config, SectionEntry};
use crate::crawler::parser::{discover_thread_pages, parse_listing};
use crate::output::{CrawlSummary, SectionTally};
use crate::render::{RenderError, RenderRequest, RenderSettings, RenderedPage, Renderer};
use crate::state::{Ledger, ThreadRef};
use crate::url::page_number;
use crate::wait_for_interrupt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Main crawler coordinator structure
pub struct Coordinator<R, F> {
    config: Arc<Config>,
    renderer: R,
    pipeline: AssetPipeline<F>,
    ledger: Ledger,
    ledger_path: PathBuf,
    layout: ArchiveLayout,
}

impl<R: Renderer, F: AssetFetcher> Coordinator<R, F> {
    /// Creates a coordinator over a restored ledger
    ///
    /// The renderer and the pipeline must share the same asset cache so
    /// that transport captures are visible to the embedding pass.
    pub fn new(config: Config, renderer: R, pipeline: AssetPipeline<F>, ledger: Ledger) -> Self {
        let ledger_path = config.ledger_path();
        let layout = ArchiveLayout::new(config.output.archive_dir.clone());

        Self {
            config: Arc::new(config),
            renderer,
            pipeline,
            ledger,
            ledger_path,
            layout,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Runs the crawl over the given sections
    ///
    /// Sections are processed one after another. On completion, error or
    /// Ctrl-C the ledger is persisted and the renderer closed before
    /// returning.
    pub async fn run(&mut self, sections: &[SectionEntry]) -> crate::Result<CrawlSummary> {
        info!("Starting crawl of {} section(s)", sections.len());
        let start_time = std::time::Instant::now();

        let mut tallies: Vec<SectionTally> = sections
            .iter()
            .map(|section| SectionTally::new(&section.name))
            .collect();

        let outcome = tokio::select! {
            result = self.process_sections(sections, &mut tallies) => result.map(|_| false),
            _ = wait_for_interrupt() => {
                warn!("Interrupted, saving progress");
                Ok(true)
            }
        };

        // Cleanup runs on every path
        let persisted = self.persist();
        if let Err(e) = self.renderer.close().await {
            warn!(error = %e, "Failed to close renderer");
        }

        let interrupted = outcome?;
        persisted?;

        for violation in self.ledger.check_invariants(&self.config.forum) {
            warn!("Ledger inconsistency: {}", violation);
        }

        for tally in &mut tallies {
            if let Some(state) = self.ledger.section(&tally.name) {
                let (done, total) = state.progress();
                tally.completed = done;
                tally.discovered = total;
            }
        }

        info!(
            "Crawl {} in {:?} ({} ledger write(s))",
            if interrupted { "interrupted" } else { "completed" },
            start_time.elapsed(),
            self.ledger.writes()
        );

        Ok(CrawlSummary {
            sections: tallies,
            interrupted,
        })
    }

    async fn process_sections(
        &mut self,
        sections: &[SectionEntry],
        tallies: &mut [SectionTally],
    ) -> crate::Result<()> {
        for (section, tally) in sections.iter().zip(tallies.iter_mut()) {
            self.process_section(section, tally).await?;
        }
        Ok(())
    }

    /// Discovers the threads of a section by following its listing pages
    ///
    /// Stops at the first render failure or when a listing page has no next
    /// link. Returns the threads in encounter order and the number of
    /// listing pages rendered.
    pub async fn discover_threads(
        &mut self,
        section: &SectionEntry,
    ) -> crate::Result<(Vec<ThreadRef>, usize)> {
        let mut current = Url::parse(&section.url)?;
        let mut threads = Vec::new();
        let mut seen = HashSet::new();
        let mut renders = 0;

        loop {
            let page = match self.render_page(&current, false).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        section = %section.name,
                        url = %current,
                        error = %e,
                        "Listing render failed; discovery stops here"
                    );
                    break;
                }
            };
            renders += 1;

            let listing = parse_listing(&page.markup, &current, &self.config.forum);
            let before = threads.len();
            for thread in listing.threads {
                if seen.insert(thread.id.clone()) {
                    threads.push(thread);
                }
            }

            info!(
                section = %section.name,
                page = renders,
                new = threads.len() - before,
                total = threads.len(),
                "Listing page parsed"
            );

            match listing.next {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok((threads, renders))
    }

    /// Archives every incomplete thread of a section
    pub async fn process_section(
        &mut self,
        section: &SectionEntry,
        tally: &mut SectionTally,
    ) -> crate::Result<()> {
        let name = section.name.as_str();
        info!("=== Section: {} ===", name);

        if self.ledger.section_state(name).is_frozen() {
            debug!(section = name, "Using discovered thread list from ledger");
        } else {
            let (threads, renders) = self.discover_threads(section).await?;
            tally.listing_renders = renders;
            if threads.is_empty() {
                warn!(section = name, "No threads discovered");
            }
            self.ledger.section_state(name).freeze_discovered(threads);
            self.persist()?;
        }

        let state = self.ledger.section_state(name);
        let threads = state.discovered().to_vec();
        tally.discovered = threads.len();
        if let Some(resume) = state.resume_point() {
            info!(
                section = name,
                threads = threads.len(),
                done = state.completed_threads().len(),
                "Resuming at thread {} ({})",
                resume.id,
                resume.title
            );
        }

        let persist_every = self.config.crawler.persist_every.max(1) as usize;
        let mut since_persist = 0;

        for (position, thread) in threads.iter().enumerate() {
            if self.ledger.section_state(name).is_thread_complete(&thread.id) {
                tally.skipped += 1;
                continue;
            }

            let completed = if self.layout.is_plausibly_complete(name, thread) {
                debug!(section = name, thread = %thread.id, "Found on disk; marking complete");
                tally.healed += 1;
                true
            } else {
                info!(
                    section = name,
                    thread = %thread.id,
                    "[{}/{}] {}",
                    position + 1,
                    threads.len(),
                    thread.title
                );
                let saved = self.archive_thread(name, thread, tally).await;
                if saved {
                    tally.threads_saved += 1;
                }
                saved
            };

            if completed && self.ledger.section_state(name).mark_thread_complete(&thread.id) {
                since_persist += 1;
                if since_persist >= persist_every {
                    self.persist()?;
                    since_persist = 0;
                }
            }
        }

        self.persist()?;
        Ok(())
    }

    /// Renders, embeds and saves every page of one thread
    ///
    /// Returns true only when every page was saved or already present.
    async fn archive_thread(
        &mut self,
        section: &str,
        thread: &ThreadRef,
        tally: &mut SectionTally,
    ) -> bool {
        let thread_url = match Url::parse(&thread.url) {
            Ok(url) => url,
            Err(e) => {
                error!(section, thread = %thread.id, url = %thread.url, error = %e, "Invalid thread URL");
                return false;
            }
        };

        let first = match self.render_page(&thread_url, true).await {
            Ok(page) => page,
            Err(e) => {
                warn!(section, thread = %thread.id, url = %thread_url, error = %e, "Thread render failed");
                tally.render_failures += 1;
                return false;
            }
        };

        let pages = discover_thread_pages(&first.markup, &thread_url, &self.config.forum);

        if pages.len() <= 1 {
            let path = self.layout.thread_file(section, thread);
            let markup = self.embed_assets(first, tally).await;
            return self.save_page(section, &thread_url, &path, &markup, tally);
        }

        debug!(section, thread = %thread.id, pages = pages.len(), "Multi-page thread");

        let page_size = self.config.forum.page_size;
        let mut first = Some(first);
        let mut all_saved = true;

        for page in &pages {
            let path = self
                .layout
                .page_file(section, thread, page_number(page.offset, page_size));

            if has_plausible_size(&path) {
                tally.pages_existing += 1;
                self.ledger
                    .section_state(section)
                    .mark_page_complete(&page.url, &self.config.forum);
                continue;
            }

            let rendered = match first.take().filter(|_| page.offset == 0) {
                Some(rendered) => rendered,
                None => match self.render_page(&page.url, true).await {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        warn!(
                            section,
                            thread = %thread.id,
                            url = %page.url,
                            error = %e,
                            "Page render failed"
                        );
                        tally.render_failures += 1;
                        all_saved = false;
                        continue;
                    }
                },
            };

            let markup = self.embed_assets(rendered, tally).await;
            if !self.save_page(section, &page.url, &path, &markup, tally) {
                all_saved = false;
            }
        }

        all_saved
    }

    /// Renders one page, then waits out the politeness delay
    ///
    /// The transport cache is cleared first so it only holds this page's
    /// responses.
    async fn render_page(&mut self, url: &Url, scroll: bool) -> Result<RenderedPage, RenderError> {
        self.pipeline.cache().clear();
        let request = RenderRequest::new(url.clone()).with_scroll(scroll);
        let result = self.renderer.render(&request).await;

        let delay = self.config.crawler.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        result
    }

    /// Applies the configured embedding passes; failures keep the markup
    async fn embed_assets(&self, page: RenderedPage, tally: &mut SectionTally) -> String {
        let mut markup = page.markup;

        if self.config.crawler.embed_images {
            match self
                .pipeline
                .embed_images(&markup, &page.final_url, &page.cookies)
                .await
            {
                Ok((output, stats)) => {
                    tally.assets.merge(&stats);
                    markup = output;
                }
                Err(e) => warn!(url = %page.final_url, error = %e, "Image embedding failed"),
            }
        }

        if self.config.crawler.embed_css {
            match self
                .pipeline
                .inline_stylesheets(&markup, &page.final_url, &page.cookies)
                .await
            {
                Ok((output, stats)) => {
                    tally.assets.merge(&stats);
                    markup = output;
                }
                Err(e) => warn!(url = %page.final_url, error = %e, "Stylesheet inlining failed"),
            }
        }

        markup
    }

    fn save_page(
        &mut self,
        section: &str,
        page_url: &Url,
        path: &Path,
        markup: &str,
        tally: &mut SectionTally,
    ) -> bool {
        match write_page(path, markup) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = markup.len(), "Saved page");
                tally.pages_saved += 1;
                self.ledger
                    .section_state(section)
                    .mark_page_complete(page_url, &self.config.forum);
                true
            }
            Err(e) => {
                error!(section, url = %page_url, path = %path.display(), error = %e, "Failed to write page");
                tally.write_failures += 1;
                false
            }
        }
    }

    fn persist(&mut self) -> crate::Result<()> {
        if self.ledger.persist(&self.ledger_path)? {
            debug!(path = %self.ledger_path.display(), "Ledger saved");
        }
        Ok(())
    }
}

/// Runs a complete crawl
///
/// Restores the ledger from the archive directory, starts the renderer
/// (headless Chromium with the `browser` feature, plain HTTP otherwise)
/// and archives the selected sections; `None` selects all of them.
///
/// # Example
///
/// ```no_run
/// use forum_archiver::config::load_config;
/// use forum_archiver::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("forum.toml"))?;
/// let summary = run_crawl(config, None).await?;
/// forum_archiver::output::print_crawl_summary(&summary);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, sections: Option<Vec<usize>>) -> crate::Result<CrawlSummary> {
    let selected = select_sections(&config, sections.as_deref())?;

    std::fs::create_dir_all(&config.output.archive_dir)?;
    let ledger = Ledger::restore(&config.ledger_path())?;

    let cache = Arc::new(AssetCache::new());
    let settings = RenderSettings::from_config(&config.crawler);
    let fetcher = HttpAssetFetcher::new(&config.crawler.user_agent, config.crawler.asset_timeout())?;
    let pipeline = AssetPipeline::new(cache.clone(), fetcher);

    #[cfg(feature = "browser")]
    let renderer = crate::render::ChromiumRenderer::launch(settings, cache).await?;
    #[cfg(not(feature = "browser"))]
    let renderer = crate::render::HttpRenderer::new(&settings, cache)?;

    info!(
        archive = %config.output.archive_dir.display(),
        embed_images = config.crawler.embed_images,
        embed_css = config.crawler.embed_css,
        "Archive ready"
    );

    let mut coordinator = Coordinator::new(config, renderer, pipeline, ledger);
    coordinator.run(&selected).await
}
