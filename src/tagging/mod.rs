use std::error::Error;
use std::fmt;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::models::{Note, Notebook, Tag};
use crate::paginate::{fetch_all, FetchError};
use crate::transport::Transport;

mod apply;
mod reconcile;

use apply::{count_taggable, Applier};
use reconcile::{FolderTagMap, Reconciler, TagIndex, TagPlan};

pub const FOLDERS_ENDPOINT: &str = "/folders?fields=id,title";
pub const TAGS_ENDPOINT: &str = "/tags?fields=id,title";
pub const NOTES_ENDPOINT: &str = "/notes?fields=id,title,parent_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub prefix: String,
    pub dry_run: bool,
    pub refetch_on_conflict: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub base_url: String,
    pub prefix: String,
    pub dry_run: bool,
    pub notebooks_found: u64,
    pub required_tags: u64,
    pub tags_found: u64,
    pub tags_created: u64,
    pub tag_conflicts: Vec<String>,
    pub tag_failures: Vec<String>,
    pub conflicts_resolved: u64,
    pub planned_tags: Vec<String>,
    pub notes_processed: u64,
    pub tags_applied: u64,
    /// Dry run only: notes a real run would tag.
    pub notes_to_tag: u64,
    pub notes_skipped_unmapped: u64,
    pub notes_skipped_unresolved: u64,
    pub tag_apply_failures: u64,
    pub finished_at: String,
}

/// Runs the notebook-to-tag sync: load notebooks, load tags, create the
/// missing tags, load notes, tag every note.
pub struct SyncService<'a> {
    transport: &'a Transport,
    options: SyncOptions,
}

impl<'a> SyncService<'a> {
    pub fn new(transport: &'a Transport, options: SyncOptions) -> Self {
        Self { transport, options }
    }

    pub fn run(&self) -> Result<SyncSummary, SyncError> {
        info!(
            prefix = %self.options.prefix,
            dry_run = self.options.dry_run,
            "starting notebook tag sync"
        );

        info!("loading notebooks");
        let notebooks: Vec<Notebook> = load(self.transport, "notebooks", FOLDERS_ENDPOINT)?;
        let folders = FolderTagMap::build(&self.options.prefix, &notebooks);
        info!(
            notebooks = notebooks.len(),
            required_tags = folders.required_names().len(),
            "collected notebook tag names"
        );

        info!("loading existing tags");
        let existing: Vec<Tag> = load(self.transport, "tags", TAGS_ENDPOINT)?;
        let mut index = TagIndex::from_tags(&existing);
        info!(tags = existing.len(), indexed = index.len(), "indexed existing tags");

        let plan = TagPlan::compute(&folders, &index);
        let mut summary = SyncSummary {
            base_url: self.transport.base_url().to_string(),
            prefix: self.options.prefix.clone(),
            dry_run: self.options.dry_run,
            notebooks_found: notebooks.len() as u64,
            required_tags: folders.required_names().len() as u64,
            tags_found: existing.len() as u64,
            tags_created: 0,
            tag_conflicts: Vec::new(),
            tag_failures: Vec::new(),
            conflicts_resolved: 0,
            planned_tags: Vec::new(),
            notes_processed: 0,
            tags_applied: 0,
            notes_to_tag: 0,
            notes_skipped_unmapped: 0,
            notes_skipped_unresolved: 0,
            tag_apply_failures: 0,
            finished_at: String::new(),
        };

        if self.options.dry_run {
            summary.planned_tags = plan.missing().to_vec();
        } else if plan.is_empty() {
            info!("all notebook tags already exist");
        } else {
            info!(missing = plan.missing().len(), "creating missing tags");
            let report = Reconciler::new(self.transport).create_missing(&plan, &mut index);
            info!(created = report.created, "finished creating tags");
            if self.options.refetch_on_conflict && !report.conflicts.is_empty() {
                summary.conflicts_resolved = self.resolve_conflicts(&mut index, &report.conflicts);
            }
            summary.tags_created = report.created;
            summary.tag_conflicts = report.conflicts;
            summary.tag_failures = report.failures;
        }

        info!("loading notes");
        let notes: Vec<Note> = load(self.transport, "notes", NOTES_ENDPOINT)?;
        summary.notes_processed = notes.len() as u64;

        if self.options.dry_run {
            summary.notes_to_tag = count_taggable(&notes, &folders, &index, &plan);
        } else {
            info!(notes = notes.len(), "applying tags to notes");
            let report = Applier::new(self.transport, &folders, &index).apply(&notes);
            info!(
                processed = report.processed,
                applied = report.applied,
                "finished tagging notes"
            );
            summary.tags_applied = report.applied;
            summary.notes_skipped_unmapped = report.skipped_unmapped;
            summary.notes_skipped_unresolved = report.skipped_unresolved;
            summary.tag_apply_failures = report.failed;
        }

        summary.finished_at = now_utc_rfc3339();
        info!(
            tags_created = summary.tags_created,
            tags_applied = summary.tags_applied,
            "notebook tag sync completed"
        );
        Ok(summary)
    }

    // A conflict means the tag exists but was missing from the first listing,
    // so one more listing can supply its id.
    fn resolve_conflicts(&self, index: &mut TagIndex, conflicts: &[String]) -> u64 {
        info!(conflicts = conflicts.len(), "re-loading tags to resolve creation conflicts");
        match fetch_all::<Tag>(self.transport, TAGS_ENDPOINT) {
            Ok(tags) => {
                let resolved = index.absorb(&tags, conflicts);
                if resolved < conflicts.len() {
                    warn!(
                        unresolved = conflicts.len() - resolved,
                        "some conflicting tags are still missing after re-load"
                    );
                }
                resolved as u64
            }
            Err(err) => {
                warn!(error = %err, "could not re-load tags; conflicting tags stay unresolved");
                0
            }
        }
    }
}

fn load<T: serde::de::DeserializeOwned>(
    transport: &Transport,
    resource: &'static str,
    endpoint: &str,
) -> Result<Vec<T>, SyncError> {
    fetch_all(transport, endpoint).map_err(|source| SyncError::Load { resource, source })
}

fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[derive(Debug)]
pub enum SyncError {
    Load {
        resource: &'static str,
        source: FetchError,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Load { resource, source } => {
                write!(f, "failed to load {}: {}", resource, source)
            }
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SyncError::Load { source, .. } => Some(source),
        }
    }
}
