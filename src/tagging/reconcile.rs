use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::{CreateTagRequest, Notebook, Tag};
use crate::paginate::FetchError;
use crate::transport::Transport;

pub fn normalize_tag_name(name: &str) -> String {
    name.to_lowercase()
}

/// Notebook id to normalized tag name, plus the distinct tag names those
/// notebooks require in their original case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderTagMap {
    by_folder: HashMap<String, String>,
    required: Vec<String>,
}

impl FolderTagMap {
    /// The first notebook seen for a normalized name decides the casing used
    /// when the tag gets created.
    pub fn build(prefix: &str, notebooks: &[Notebook]) -> Self {
        let mut by_folder = HashMap::with_capacity(notebooks.len());
        let mut required = Vec::new();
        let mut seen = HashSet::new();

        for notebook in notebooks {
            let prefixed = format!("{prefix}{}", notebook.title);
            let normalized = normalize_tag_name(&prefixed);
            if seen.insert(normalized.clone()) {
                required.push(prefixed);
            }
            by_folder.insert(notebook.id.clone(), normalized);
        }

        Self {
            by_folder,
            required,
        }
    }

    pub fn normalized_for(&self, folder_id: &str) -> Option<&str> {
        self.by_folder.get(folder_id).map(String::as_str)
    }

    pub fn required_names(&self) -> &[String] {
        &self.required
    }
}

/// Normalized tag name to remote tag id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    ids: HashMap<String, String>,
}

impl TagIndex {
    pub fn from_tags(tags: &[Tag]) -> Self {
        let mut index = Self::default();
        for tag in tags {
            index
                .ids
                .insert(normalize_tag_name(&tag.title), tag.id.clone());
        }
        index
    }

    pub fn id_for(&self, normalized: &str) -> Option<&str> {
        self.ids.get(normalized).map(String::as_str)
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.ids.contains_key(normalized)
    }

    pub fn insert(&mut self, title: &str, id: String) {
        self.ids.insert(normalize_tag_name(title), id);
    }

    /// Fills ids for the `wanted` names that are not indexed yet, taking
    /// them from `tags`. Other tags in the listing are ignored and existing
    /// entries win. Returns how many wanted names now resolve.
    pub fn absorb(&mut self, tags: &[Tag], wanted: &[String]) -> usize {
        let mut pending: HashSet<String> = wanted
            .iter()
            .map(|name| normalize_tag_name(name))
            .filter(|normalized| !self.ids.contains_key(normalized))
            .collect();
        let mut added = 0;
        for tag in tags {
            let normalized = normalize_tag_name(&tag.title);
            if pending.remove(&normalized) {
                self.ids.insert(normalized, tag.id.clone());
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Required tag names with no remote counterpart yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPlan {
    missing: Vec<String>,
}

impl TagPlan {
    pub fn compute(folders: &FolderTagMap, index: &TagIndex) -> Self {
        let missing = folders
            .required_names()
            .iter()
            .filter(|name| !index.contains(&normalize_tag_name(name)))
            .cloned()
            .collect();
        Self { missing }
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn covers(&self, normalized: &str) -> bool {
        self.missing
            .iter()
            .any(|name| normalize_tag_name(name) == normalized)
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: u64,
    pub conflicts: Vec<String>,
    pub failures: Vec<String>,
}

pub struct Reconciler<'a> {
    transport: &'a Transport,
}

impl<'a> Reconciler<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Creates each planned tag and records its id. Failures never abort:
    /// a conflicting or failed name just stays out of the index.
    pub fn create_missing(&self, plan: &TagPlan, index: &mut TagIndex) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for name in plan.missing() {
            if index.contains(&normalize_tag_name(name)) {
                continue;
            }
            info!(tag = %name, "creating tag");
            match self.create_tag(name) {
                Ok(tag) => {
                    index.insert(name, tag.id);
                    report.created += 1;
                }
                Err(FetchError::Transport(err)) if err.is_conflict() => {
                    warn!(
                        tag = %name,
                        error = %err,
                        "tag already exists remotely but was not listed; notes needing it will be skipped"
                    );
                    report.conflicts.push(name.clone());
                }
                Err(err) => {
                    error!(tag = %name, error = %err, "failed to create tag");
                    report.failures.push(name.clone());
                }
            }
        }

        report
    }

    fn create_tag(&self, title: &str) -> Result<Tag, FetchError> {
        let body = self
            .transport
            .post_json("/tags", &CreateTagRequest { title })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Parse {
            endpoint: "/tags".to_string(),
            source,
        })
    }
}
