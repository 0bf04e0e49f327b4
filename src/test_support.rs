use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::{json, Value};

use crate::models::{Note, Notebook, Tag};
use crate::transport::{HttpBackend, HttpResponse, NetworkError, Sleeper, Transport};

pub const TEST_BASE_URL: &str = "http://joplin.test:41184";
pub const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    fn from_parts(method: &Method, url: &Url, body: Option<&[u8]>) -> Self {
        Self {
            method: method.clone(),
            path: url.path().to_string(),
            query: url
                .query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
            body: body.map(|bytes| serde_json::from_slice(bytes).expect("body should be JSON")),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Replays a fixed queue of outcomes, one per attempt.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    outcomes: Rc<RefCell<VecDeque<Result<HttpResponse, NetworkError>>>>,
    requests: Rc<RefCell<Vec<RecordedRequest>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: &str) -> &Self {
        self.outcomes.borrow_mut().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.outcomes
            .borrow_mut()
            .push_back(Err(NetworkError(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }
}

impl HttpBackend for ScriptedBackend {
    fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, NetworkError> {
        self.requests
            .borrow_mut()
            .push(RecordedRequest::from_parts(method, url, body.as_deref()));
        self.outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(NetworkError("script exhausted".to_string())))
    }
}

#[derive(Clone, Default)]
pub struct RecordingSleeper {
    slept: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

#[derive(Default)]
struct JoplinState {
    folders: Vec<Notebook>,
    tags: Vec<Tag>,
    notes: Vec<Note>,
    links: HashSet<(String, String)>,
    racing_titles: HashSet<String>,
    late_tags: Vec<String>,
    failing_paths: HashSet<String>,
    next_id: u64,
    requests: Vec<RecordedRequest>,
}

impl JoplinState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:04}", self.next_id)
    }

    fn find_tag(&self, title: &str) -> Option<&Tag> {
        let wanted = title.to_lowercase();
        self.tags.iter().find(|tag| tag.title.to_lowercase() == wanted)
    }
}

/// In-memory Joplin Data API covering the endpoints the sync uses.
#[derive(Clone, Default)]
pub struct FakeJoplin {
    state: Rc<RefCell<JoplinState>>,
}

impl FakeJoplin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, id: &str, title: &str) -> &Self {
        self.state.borrow_mut().folders.push(Notebook {
            id: id.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn add_tag(&self, id: &str, title: &str) -> &Self {
        self.state.borrow_mut().tags.push(Tag {
            id: id.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn add_note(&self, id: &str, parent_id: &str) -> &Self {
        self.state.borrow_mut().notes.push(Note {
            id: id.to_string(),
            title: format!("note {id}"),
            parent_id: parent_id.to_string(),
        });
        self
    }

    /// Another client creates this tag right before our create lands.
    pub fn race_tag_creation(&self, title: &str) -> &Self {
        self.state
            .borrow_mut()
            .racing_titles
            .insert(title.to_lowercase());
        self
    }

    /// Another client creates `title` while a raced creation is in flight,
    /// so it only shows up in listings taken after that POST.
    pub fn add_late_tag(&self, title: &str) -> &Self {
        self.state.borrow_mut().late_tags.push(title.to_string());
        self
    }

    /// Every request to `path` answers with a 500.
    pub fn fail_path(&self, path: &str) -> &Self {
        self.state
            .borrow_mut()
            .failing_paths
            .insert(path.to_string());
        self
    }

    pub fn transport(&self) -> Transport {
        Transport::new(TEST_BASE_URL, TEST_TOKEN, Box::new(self.clone()))
            .with_sleeper(Box::new(RecordingSleeper::new()))
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state.borrow().tags.clone()
    }

    pub fn tag_count(&self) -> usize {
        self.state.borrow().tags.len()
    }

    pub fn is_linked(&self, tag_id: &str, note_id: &str) -> bool {
        self.state
            .borrow()
            .links
            .contains(&(tag_id.to_string(), note_id.to_string()))
    }

    pub fn link_count(&self) -> usize {
        self.state.borrow().links.len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn post_count(&self) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|request| request.method == Method::POST)
            .count()
    }

    fn handle(&self, request: &RecordedRequest) -> HttpResponse {
        let mut state = self.state.borrow_mut();
        if request.param("token") != Some(TEST_TOKEN) {
            return reply(403, json!({ "error": "Invalid \"token\" parameter" }));
        }
        if state.failing_paths.contains(&request.path) {
            return reply(500, json!({ "error": "Internal Server Error" }));
        }

        let segments: Vec<&str> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .collect();
        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["folders"]) => paged(&state.folders, request),
            ("GET", ["tags"]) => paged(&state.tags, request),
            ("GET", ["notes"]) => paged(&state.notes, request),
            ("POST", ["tags"]) => {
                let title = request
                    .body
                    .as_ref()
                    .and_then(|body| body.get("title"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if state.racing_titles.remove(&title.to_lowercase()) {
                    let id = state.allocate_id("tag");
                    state.tags.push(Tag {
                        id,
                        title: title.clone(),
                    });
                    for late in std::mem::take(&mut state.late_tags) {
                        let id = state.allocate_id("tag");
                        state.tags.push(Tag { id, title: late });
                    }
                }
                if state.find_tag(&title).is_some() {
                    return reply(
                        500,
                        json!({
                            "error": format!(
                                "The tag \"{title}\" already exists. Please choose a different name."
                            )
                        }),
                    );
                }
                let tag = Tag {
                    id: state.allocate_id("tag"),
                    title,
                };
                state.tags.push(tag.clone());
                reply(200, json!({ "id": tag.id, "title": tag.title }))
            }
            ("POST", ["tags", tag_id, "notes"]) => {
                let note_id = request
                    .body
                    .as_ref()
                    .and_then(|body| body.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if !state.tags.iter().any(|tag| tag.id == *tag_id) {
                    return reply(404, json!({ "error": "Not Found" }));
                }
                state.links.insert((tag_id.to_string(), note_id.clone()));
                reply(200, json!({ "id": note_id }))
            }
            _ => reply(404, json!({ "error": "Not Found" })),
        }
    }
}

impl HttpBackend for FakeJoplin {
    fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, NetworkError> {
        let request = RecordedRequest::from_parts(method, url, body.as_deref());
        self.state.borrow_mut().requests.push(request.clone());
        Ok(self.handle(&request))
    }
}

fn reply(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

fn paged<T: serde::Serialize>(items: &[T], request: &RecordedRequest) -> HttpResponse {
    let limit: usize = request
        .param("limit")
        .and_then(|value| value.parse().ok())
        .unwrap_or(10);
    let page: usize = request
        .param("page")
        .and_then(|value| value.parse().ok())
        .unwrap_or(1);
    let start = (page.saturating_sub(1) * limit).min(items.len());
    let end = (start + limit).min(items.len());
    reply(
        200,
        json!({
            "items": &items[start..end],
            "has_more": end < items.len(),
            "total_items": items.len(),
        }),
    )
}
