//! Cross-corpus reference index
//!
//! One entry per video identifier, recording where in the archive it was
//! referenced and how far its resolution got. The index is a single JSON
//! document keyed by identifier.

use crate::media::extract::canonical_url;
use crate::media::resolver::ResolveOutcome;
use crate::media::status::MediaStatus;
use crate::state::{read_json_document, write_json_atomic, OrderedSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// What is known about one referenced video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Canonical watch URL
    pub url: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Sections referencing the video, first-seen order
    #[serde(default)]
    pub sections: OrderedSet,

    /// Archive-relative paths of referencing pages, first-seen order
    #[serde(default)]
    pub source_pages: OrderedSet,

    #[serde(default)]
    pub status: MediaStatus,

    #[serde(default)]
    pub local_file: Option<String>,

    #[serde(default)]
    pub last_error: Option<String>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ReferenceEntry {
    fn new(video_id: &str) -> Self {
        Self {
            url: canonical_url(video_id),
            title: None,
            sections: OrderedSet::new(),
            source_pages: OrderedSet::new(),
            status: MediaStatus::Pending,
            local_file: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// All referenced videos, keyed by identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceIndex {
    entries: BTreeMap<String, ReferenceEntry>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index; a missing file yields an empty index
    pub fn load(path: &Path) -> crate::Result<Self> {
        let index: Self = read_json_document(path)?;
        if !index.is_empty() {
            info!(path = %path.display(), videos = index.len(), "Loaded reference index");
        }
        Ok(index)
    }

    /// Writes the whole index through a temp file and rename
    pub fn persist(&self, path: &Path) -> crate::Result<()> {
        write_json_atomic(path, self)?;
        debug!(path = %path.display(), videos = self.len(), "Reference index persisted");
        Ok(())
    }

    /// Records a reference from `source_page` in `section`
    ///
    /// The first sighting creates a pending entry. Later sightings only
    /// extend the section and source lists; the status is never touched.
    /// Returns true when the entry is new.
    pub fn add_reference(&mut self, video_id: &str, section: &str, source_page: &str) -> bool {
        let mut created = false;
        let entry = self.entries.entry(video_id.to_string()).or_insert_with(|| {
            created = true;
            ReferenceEntry::new(video_id)
        });

        let added_section = entry.sections.insert(section);
        let added_source = entry.source_pages.insert(source_page);
        if created || added_section || added_source {
            entry.updated_at = Utc::now();
        }

        created
    }

    /// Applies a resolution outcome
    ///
    /// Outcomes for unknown identifiers or terminal entries are ignored.
    /// Returns true when the entry changed.
    pub fn record_outcome(&mut self, video_id: &str, outcome: &ResolveOutcome) -> bool {
        let Some(entry) = self.entries.get_mut(video_id) else {
            return false;
        };
        if entry.status.is_terminal() {
            debug!(video = video_id, status = %entry.status, "Ignoring outcome for terminal entry");
            return false;
        }

        match outcome {
            ResolveOutcome::Downloaded { path, title } => {
                entry.status = MediaStatus::Downloaded;
                entry.local_file = path.as_ref().map(|p| p.to_string_lossy().to_string());
                if title.is_some() {
                    entry.title = title.clone();
                }
                entry.last_error = None;
            }
            ResolveOutcome::Unavailable(phrase) => {
                entry.status = MediaStatus::Unavailable;
                entry.last_error = Some(phrase.clone());
            }
            ResolveOutcome::Failed(reason) => {
                entry.status = MediaStatus::Failed;
                entry.last_error = Some(reason.clone());
            }
        }
        entry.updated_at = Utc::now();
        true
    }

    /// Moves every failed entry back to pending; returns how many moved
    pub fn retry_failed(&mut self) -> usize {
        let mut reset = 0;
        for entry in self.entries.values_mut() {
            if entry.status == MediaStatus::Failed {
                entry.status = MediaStatus::Pending;
                entry.updated_at = Utc::now();
                reset += 1;
            }
        }
        reset
    }

    pub fn get(&self, video_id: &str) -> Option<&ReferenceEntry> {
        self.entries.get(video_id)
    }

    pub fn status(&self, video_id: &str) -> Option<MediaStatus> {
        self.entries.get(video_id).map(|entry| entry.status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ReferenceEntry)> {
        self.entries.iter()
    }

    /// Entries referenced from `section`
    pub fn entries_for_section<'a>(
        &'a self,
        section: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a ReferenceEntry)> + 'a {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.sections.contains(section))
    }
}
