use reqwest::Method;

use crate::models::{Note, Notebook, Tag};
use crate::test_support::{FakeJoplin, RecordingSleeper, ScriptedBackend, TEST_BASE_URL, TEST_TOKEN};
use crate::transport::Transport;

use super::{fetch_all, FetchError, PAGE_SIZE};

fn scripted_transport(backend: &ScriptedBackend) -> Transport {
    Transport::new(TEST_BASE_URL, TEST_TOKEN, Box::new(backend.clone()))
        .with_sleeper(Box::new(RecordingSleeper::new()))
}

#[test]
fn fetch_all_walks_every_page_in_server_order() {
    let server = FakeJoplin::new();
    for index in 0..250 {
        server.add_note(&format!("n{index:03}"), "f1");
    }
    let transport = server.transport();

    let notes: Vec<Note> =
        fetch_all(&transport, "/notes?fields=id,title,parent_id").expect("fetch should succeed");
    assert_eq!(notes.len(), 250);
    assert_eq!(notes[0].id, "n000");
    assert_eq!(notes[100].id, "n100");
    assert_eq!(notes[249].id, "n249");
    assert_eq!(server.requests_to(Method::GET, "/notes"), 3);

    let pages: Vec<String> = server
        .requests()
        .iter()
        .filter_map(|request| request.param("page").map(str::to_string))
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
    let limit = PAGE_SIZE.to_string();
    assert!(server
        .requests()
        .iter()
        .all(|request| request.param("limit") == Some(limit.as_str())));
}

#[test]
fn exact_multiple_of_page_size_needs_no_extra_request() {
    let server = FakeJoplin::new();
    for index in 0..200 {
        server.add_folder(&format!("f{index}"), &format!("Folder {index}"));
    }
    let transport = server.transport();

    let folders: Vec<Notebook> =
        fetch_all(&transport, "/folders?fields=id,title").expect("fetch should succeed");
    assert_eq!(folders.len(), 200);
    assert_eq!(server.requests_to(Method::GET, "/folders"), 2);
}

#[test]
fn empty_collection_is_one_request() {
    let server = FakeJoplin::new();
    let transport = server.transport();

    let tags: Vec<Tag> = fetch_all(&transport, "/tags?fields=id,title").expect("fetch");
    assert!(tags.is_empty());
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn endpoint_without_query_gets_question_mark_separator() {
    let backend = ScriptedBackend::new();
    backend.respond(200, r#"{"items":[{"id":"t1","title":"A"}],"has_more":false}"#);
    let transport = scripted_transport(&backend);

    let tags: Vec<Tag> = fetch_all(&transport, "/tags").expect("fetch should succeed");
    assert_eq!(tags.len(), 1);
    let request = &backend.requests()[0];
    assert_eq!(request.path, "/tags");
    assert_eq!(request.param("limit"), Some("100"));
    assert_eq!(request.param("page"), Some("1"));
}

#[test]
fn failing_second_page_discards_partial_results() {
    let backend = ScriptedBackend::new();
    backend
        .respond(200, r#"{"items":[{"id":"t1","title":"A"}],"has_more":true}"#)
        .respond(500, "Internal Server Error");
    let transport = scripted_transport(&backend);

    let err = fetch_all::<Tag>(&transport, "/tags?fields=id,title")
        .expect_err("second page should fail the fetch");
    assert!(matches!(err, FetchError::Transport(_)));
}

#[test]
fn malformed_items_fail_with_parse_error() {
    let backend = ScriptedBackend::new();
    backend.respond(200, r#"{"items":[{"title":"no id"}],"has_more":false}"#);
    let transport = scripted_transport(&backend);

    let err = fetch_all::<Notebook>(&transport, "/folders?fields=id,title")
        .expect_err("item without id should not parse");
    match err {
        FetchError::Parse { endpoint, .. } => {
            assert_eq!(endpoint, "/folders?fields=id,title&limit=100&page=1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_envelope_fails_with_parse_error() {
    let backend = ScriptedBackend::new();
    backend.respond(200, "<html>not json</html>");
    let transport = scripted_transport(&backend);

    let err = fetch_all::<Tag>(&transport, "/tags").expect_err("html is not an envelope");
    assert!(err.to_string().contains("malformed response"));
}
