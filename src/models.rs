use serde::{Deserialize, Serialize};

/// A Joplin notebook. The API calls these folders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notebook {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_id: String,
}

/// Wrapper returned by every listing endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PageEnvelope<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total_items: u64,
}

#[derive(Debug, Serialize)]
pub struct CreateTagRequest<'a> {
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TagNoteRequest<'a> {
    pub id: &'a str,
}
