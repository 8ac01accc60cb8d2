//! textDocument/completion E2E tests

mod helper;

use std::sync::atomic::Ordering;
use std::time::Duration;

use tower_lsp::lsp_types::{
    DiagnosticSeverity, Position, PublishDiagnosticsParams, Range, TextEdit,
};

use assist_lsp::config::Config;
use helper::{StubBackend, completion_items, registry_with, spawn_server, test_config};

const URI: &str = "file:///test/add.js";

#[tokio::test(flavor = "multi_thread")]
async fn completes_inside_function_body() {
    // 1. Backend answering with one suggestion
    let stub = StubBackend::new().with_completions(&["return a + b;"]);
    let requests = stub.completion_requests.clone();
    let mut client = spawn_server(test_config(), registry_with(stub));

    // 2. Initialize and open the document
    client.initialize().await;
    client
        .open(URI, "javascript", 1, "function add(a, b) {\n  \n}")
        .await;

    // 3. Request completion on the empty body line
    client.completion(2, URI, 1, 2).await;
    let response = client.wait_for_response(2).await;

    // 4. Verify the item and what the backend saw
    let items = completion_items(&response);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "return a + b;");
    assert_eq!(items[0].insert_text.as_deref(), Some("return a + b;"));
    assert_eq!(items[0].additional_text_edits, None);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content_before, "function add(a, b) {\n  ");
    assert_eq!(requests[0].content_after, "}");
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_duplicated_closing_brace() {
    // 1. Backend suggestion ending with the brace already in the buffer
    let stub = StubBackend::new().with_completions(&["foo() {}"]);
    let mut client = spawn_server(test_config(), registry_with(stub));

    client.initialize().await;
    client.open(URI, "javascript", 1, "}").await;

    // 2. Complete in front of the brace
    client.completion(2, URI, 0, 0).await;
    let response = client.wait_for_response(2).await;

    // 3. The item carries a deletion of the duplicated brace
    let items = completion_items(&response);
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].additional_text_edits,
        Some(vec![TextEdit::new(
            Range::new(Position::new(0, 8), Position::new(0, 9)),
            String::new(),
        )])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_request_skips_backend() {
    // 1. Long debounce so the edit lands while the request waits
    let stub = StubBackend::new().with_completions(&["return a + b;"]);
    let calls = stub.completion_calls.clone();
    let config = Config {
        debounce: 300,
        ..test_config()
    };
    let mut client = spawn_server(config, registry_with(stub));

    client.initialize().await;
    client
        .open(URI, "javascript", 3, "function add(a, b) {\n  \n}")
        .await;

    // 2. Request, then edit the document before the debounce fires
    client.completion(2, URI, 1, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client
        .change(URI, 4, "function add(a, b) {\n  r\n}")
        .await;

    // 3. Empty answer, backend never called
    let response = client.wait_for_response(2).await;
    assert!(completion_items(&response).is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn burst_of_requests_calls_backend_once() {
    let stub = StubBackend::new().with_completions(&["return a + b;"]);
    let calls = stub.completion_calls.clone();
    let mut client = spawn_server(test_config(), registry_with(stub));

    client.initialize().await;
    client
        .open(URI, "javascript", 1, "function add(a, b) {\n  \n}")
        .await;

    // 1. Two requests inside one debounce window
    client.completion(2, URI, 1, 2).await;
    client.completion(3, URI, 1, 2).await;

    let first = completion_items(&client.wait_for_response(2).await);
    let second = completion_items(&client.wait_for_response(3).await);

    // 2. Each request is answered; only the surviving one carries items
    assert_eq!(first.len() + second.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_keeps_suggestions_already_received() {
    // 1. Second attempt never answers
    let stub = StubBackend::new()
        .with_completions(&["return a + b;"])
        .stalling_after(1);
    let config = Config {
        num_suggestions: 2,
        completion_timeout: 300,
        ..test_config()
    };
    let mut client = spawn_server(config, registry_with(stub));

    client.initialize().await;
    client
        .open(URI, "javascript", 1, "function add(a, b) {\n  \n}")
        .await;

    // 2. The deadline cuts the second attempt short
    client.completion(2, URI, 1, 2).await;
    let mut skipped = Vec::new();
    let response = client.response(2, &mut skipped).await;

    // 3. The first suggestion survives and no error is reported
    let items = completion_items(&response);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "return a + b;");
    assert!(!skipped.iter().any(|message| {
        message.method() == "textDocument/publishDiagnostics"
            && message.params.as_ref().unwrap()["diagnostics"]
                .as_array()
                .is_some_and(|diagnostics| !diagnostics.is_empty())
    }));
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_failure_publishes_error_diagnostic() {
    // 1. Failing backend
    let stub = StubBackend::new().with_completion_error("quota exceeded");
    let mut client = spawn_server(test_config(), registry_with(stub));

    client.initialize().await;
    client
        .open(URI, "javascript", 1, "function add(a, b) {\n  \n}")
        .await;

    // 2. Completion answers an empty list
    client.completion(2, URI, 1, 2).await;
    let mut skipped = Vec::new();
    let response = client.response(2, &mut skipped).await;
    assert!(completion_items(&response).is_empty());

    // 3. The failure was reported on the cursor line before the answer
    let published = skipped
        .iter()
        .find(|message| message.method() == "textDocument/publishDiagnostics")
        .expect("no diagnostics published");
    let params: PublishDiagnosticsParams =
        serde_json::from_value(published.params.clone().unwrap()).unwrap();

    assert_eq!(params.uri.as_str(), URI);
    assert_eq!(params.diagnostics.len(), 1);
    let diagnostic = &params.diagnostics[0];
    assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(diagnostic.source.as_deref(), Some("assist-lsp"));
    assert!(diagnostic.message.contains("quota exceeded"));
    assert_eq!(
        diagnostic.range,
        Range::new(Position::new(1, 0), Position::new(2, 0))
    );

    // 4. The static status message was shown while fetching
    assert!(
        skipped
            .iter()
            .any(|message| message.method() == "window/showMessage")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn no_completion_after_dot() {
    let stub = StubBackend::new().with_completions(&["log()"]);
    let calls = stub.completion_calls.clone();
    let mut client = spawn_server(test_config(), registry_with(stub));

    client.initialize().await;
    client.open(URI, "javascript", 1, "console.").await;

    client.completion(2, URI, 0, 8).await;
    let response = client.wait_for_response(2).await;

    assert!(completion_items(&response).is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_document_gets_empty_list() {
    let stub = StubBackend::new().with_completions(&["return 1;"]);
    let calls = stub.completion_calls.clone();
    let mut client = spawn_server(test_config(), registry_with(stub));

    client.initialize().await;

    client.completion(2, "file:///test/never-opened.js", 0, 0).await;
    let response = client.wait_for_response(2).await;

    assert!(completion_items(&response).is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
