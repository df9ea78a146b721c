//! Resumable crawl progress
//!
//! The ledger records, per section, the frozen list of discovered threads
//! and the threads and pages already saved. It is restored at startup and
//! persisted periodically and on shutdown.

use crate::config::ForumConfig;
use crate::state::ordered::OrderedSet;
use crate::state::{read_json_document, write_json_atomic};
use crate::url::classify;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// A discovered thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    pub id: String,
    pub title: String,
    /// Canonical thread URL
    pub url: String,
}

impl ThreadRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Progress of one section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionState {
    #[serde(default)]
    discovered: Vec<ThreadRef>,

    #[serde(default)]
    completed_threads: OrderedSet,

    #[serde(default)]
    completed_pages: OrderedSet,

    #[serde(skip)]
    discovered_ids: HashSet<String>,

    #[serde(skip)]
    dirty: bool,
}

impl SectionState {
    fn rebuild_index(&mut self) {
        self.discovered_ids = self.discovered.iter().map(|t| t.id.clone()).collect();
    }

    /// Discovered threads in encounter order
    pub fn discovered(&self) -> &[ThreadRef] {
        &self.discovered
    }

    /// True once the discovered list has been written
    pub fn is_frozen(&self) -> bool {
        !self.discovered.is_empty()
    }

    /// Records the discovered thread list
    ///
    /// The list is written only once; later calls are ignored so the total
    /// stays a fixed denominator across runs. Returns true if the list was
    /// recorded.
    pub fn freeze_discovered(&mut self, threads: Vec<ThreadRef>) -> bool {
        if self.is_frozen() || threads.is_empty() {
            return false;
        }

        let mut seen = HashSet::new();
        self.discovered = threads
            .into_iter()
            .filter(|thread| seen.insert(thread.id.clone()))
            .collect();
        self.rebuild_index();
        self.dirty = true;
        true
    }

    pub fn is_discovered(&self, thread_id: &str) -> bool {
        self.discovered_ids.contains(thread_id)
    }

    pub fn is_thread_complete(&self, thread_id: &str) -> bool {
        self.completed_threads.contains(thread_id)
    }

    pub fn is_page_complete(&self, page_url: &str) -> bool {
        self.completed_pages.contains(page_url)
    }

    /// Marks a discovered thread complete; returns true if the state changed
    pub fn mark_thread_complete(&mut self, thread_id: &str) -> bool {
        if !self.is_discovered(thread_id) {
            warn!(thread_id, "Refusing to complete an undiscovered thread");
            return false;
        }

        let changed = self.completed_threads.insert(thread_id);
        self.dirty |= changed;
        changed
    }

    /// Marks a page complete; returns true if the state changed
    ///
    /// The page's thread, read from its URL, must have been discovered.
    pub fn mark_page_complete(&mut self, page_url: &Url, forum: &ForumConfig) -> bool {
        let class = classify(page_url, forum);
        let Some(thread_id) = class.thread_id else {
            return false;
        };

        if !self.is_discovered(&thread_id) {
            warn!(url = %page_url, "Refusing to complete a page of an undiscovered thread");
            return false;
        }

        let changed = self.completed_pages.insert(page_url.as_str());
        self.dirty |= changed;
        changed
    }

    pub fn completed_threads(&self) -> &OrderedSet {
        &self.completed_threads
    }

    pub fn completed_pages(&self) -> &OrderedSet {
        &self.completed_pages
    }

    /// First discovered thread not yet complete
    pub fn resume_point(&self) -> Option<&ThreadRef> {
        self.discovered
            .iter()
            .find(|thread| !self.completed_threads.contains(&thread.id))
    }

    /// Completed and total thread counts
    pub fn progress(&self) -> (usize, usize) {
        let done = self
            .discovered
            .iter()
            .filter(|thread| self.completed_threads.contains(&thread.id))
            .count();
        (done, self.discovered.len())
    }

    /// Lists violations of the subset invariants
    pub fn violations(&self, forum: &ForumConfig) -> Vec<String> {
        let mut violations = Vec::new();

        for thread_id in self.completed_threads.iter() {
            if !self.is_discovered(thread_id) {
                violations.push(format!("completed thread {} was never discovered", thread_id));
            }
        }

        for page in self.completed_pages.iter() {
            let thread_id = Url::parse(page)
                .ok()
                .and_then(|url| classify(&url, forum).thread_id);
            match thread_id {
                Some(id) if self.is_discovered(&id) => {}
                _ => violations.push(format!(
                    "completed page {} belongs to no discovered thread",
                    page
                )),
            }
        }

        violations
    }
}

/// Crawl progress for every section
#[derive(Debug, Default)]
pub struct Ledger {
    sections: BTreeMap<String, SectionState>,
    writes: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the ledger from `path`
    ///
    /// A missing file yields an empty ledger. A file that exists but cannot
    /// be read or parsed is an error; it is never silently replaced.
    pub fn restore(path: &Path) -> crate::Result<Self> {
        let mut sections: BTreeMap<String, SectionState> = read_json_document(path)?;
        for state in sections.values_mut() {
            state.rebuild_index();
        }

        if !sections.is_empty() {
            info!(
                path = %path.display(),
                sections = sections.len(),
                "Restored crawl ledger"
            );
        }

        Ok(Self {
            sections,
            writes: 0,
        })
    }

    /// Writes the ledger to `path` if anything changed since the last write
    ///
    /// Returns true when the file was written.
    pub fn persist(&mut self, path: &Path) -> crate::Result<bool> {
        if !self.is_dirty() {
            debug!("Ledger unchanged; skipping write");
            return Ok(false);
        }

        write_json_atomic(path, &self.sections)?;
        for state in self.sections.values_mut() {
            state.dirty = false;
        }
        self.writes += 1;
        debug!(path = %path.display(), "Ledger persisted");
        Ok(true)
    }

    /// Returns the state of a section, creating an empty one if needed
    pub fn section_state(&mut self, name: &str) -> &mut SectionState {
        self.sections.entry(name.to_string()).or_default()
    }

    pub fn section(&self, name: &str) -> Option<&SectionState> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &SectionState)> {
        self.sections.iter()
    }

    pub fn is_dirty(&self) -> bool {
        self.sections.values().any(|state| state.dirty)
    }

    /// Number of writes performed by this instance
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Lists invariant violations across all sections
    pub fn check_invariants(&self, forum: &ForumConfig) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|(name, state)| {
                state
                    .violations(forum)
                    .into_iter()
                    .map(move |violation| format!("{}: {}", name, violation))
            })
            .collect()
    }
}
