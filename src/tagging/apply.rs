use serde::Serialize;
use tracing::{debug, error};

use crate::models::{Note, TagNoteRequest};
use crate::transport::Transport;

use super::reconcile::{FolderTagMap, TagIndex, TagPlan};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ApplyReport {
    pub processed: u64,
    pub applied: u64,
    pub skipped_unmapped: u64,
    pub skipped_unresolved: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Unmapped,
    Unresolved,
    Failed,
}

/// Attaches each note's notebook tag. Reads the index, never writes it.
pub struct Applier<'a> {
    transport: &'a Transport,
    folders: &'a FolderTagMap,
    index: &'a TagIndex,
}

impl<'a> Applier<'a> {
    pub fn new(transport: &'a Transport, folders: &'a FolderTagMap, index: &'a TagIndex) -> Self {
        Self {
            transport,
            folders,
            index,
        }
    }

    pub fn apply(&self, notes: &[Note]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for note in notes {
            report.processed += 1;
            match self.apply_one(note) {
                Outcome::Applied => report.applied += 1,
                Outcome::Unmapped => report.skipped_unmapped += 1,
                Outcome::Unresolved => report.skipped_unresolved += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        report
    }

    fn apply_one(&self, note: &Note) -> Outcome {
        let Some(normalized) = self.folders.normalized_for(&note.parent_id) else {
            debug!(note = %note.id, parent = %note.parent_id, "note is outside loaded notebooks");
            return Outcome::Unmapped;
        };
        let Some(tag_id) = self.index.id_for(normalized) else {
            error!(
                note = %note.id,
                title = %note.title,
                tag = %normalized,
                "no tag id for notebook tag; skipping note"
            );
            return Outcome::Unresolved;
        };

        debug!(note = %note.id, tag_id, "tagging note");
        let path = format!("/tags/{tag_id}/notes");
        match self
            .transport
            .post_json(&path, &TagNoteRequest { id: &note.id })
        {
            Ok(_) => Outcome::Applied,
            Err(err) => {
                error!(
                    note = %note.id,
                    title = %note.title,
                    status = err.status(),
                    error = %err,
                    "failed to tag note"
                );
                Outcome::Failed
            }
        }
    }
}

/// Notes a real run would tag: their notebook's tag is indexed or planned.
pub fn count_taggable(
    notes: &[Note],
    folders: &FolderTagMap,
    index: &TagIndex,
    plan: &TagPlan,
) -> u64 {
    notes
        .iter()
        .filter_map(|note| folders.normalized_for(&note.parent_id))
        .filter(|normalized| index.contains(normalized) || plan.covers(normalized))
        .count() as u64
}
