//! Shared helpers for end-to-end tests over in-memory stdio

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{BufReader, DuplexStream, ReadHalf};
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Id;

use assist_lsp::backend::{
    Backend, BackendError, BackendRegistry, ChatRequest, CompletionRequest, collect_suggestions,
};
use assist_lsp::config::Config;
use assist_lsp::lsp::codec::{FrameReader, FrameWriter};
use assist_lsp::lsp::error::CodecError;
use assist_lsp::lsp::message::Message;
use assist_lsp::lsp::server::{SessionEnd, build_dispatcher, serve};

const WAIT: Duration = Duration::from_secs(5);

/// Backend returning canned answers and recording what it was asked
#[derive(Default)]
pub struct StubBackend {
    completions: Vec<String>,
    completion_error: Option<String>,
    stall_after: Option<usize>,
    chat: String,
    chat_error: Option<String>,
    pub completion_calls: Arc<AtomicUsize>,
    pub completion_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub chat_requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completions(mut self, completions: &[&str]) -> Self {
        self.completions = completions.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_completion_error(mut self, message: &str) -> Self {
        self.completion_error = Some(message.to_string());
        self
    }

    /// Answers one suggestion per attempt and hangs on every attempt from `attempts` on
    pub fn stalling_after(mut self, attempts: usize) -> Self {
        self.stall_after = Some(attempts);
        self
    }

    pub fn with_chat(mut self, answer: &str) -> Self {
        self.chat = answer.to_string();
        self
    }

    pub fn with_chat_error(mut self, message: &str) -> Self {
        self.chat_error = Some(message.to_string());
        self
    }
}

#[async_trait::async_trait]
impl Backend for StubBackend {
    async fn completion(
        &self,
        request: &CompletionRequest,
        _file_path: &str,
        _language_id: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.completion_requests.lock().unwrap().push(request.clone());

        if let Some(stall_after) = self.stall_after {
            return collect_suggestions(count, request.deadline, |index| async move {
                if index >= stall_after {
                    std::future::pending::<()>().await;
                }
                Ok(vec![self.completions[index % self.completions.len()].clone()])
            })
            .await;
        }

        match &self.completion_error {
            Some(message) => Err(BackendError::InvalidResponse(message.clone())),
            None => Ok(self.completions.clone()),
        }
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        _file_path: &str,
        _language_id: &str,
    ) -> Result<String, BackendError> {
        self.chat_requests.lock().unwrap().push(request.clone());

        match &self.chat_error {
            Some(message) => Err(BackendError::InvalidResponse(message.clone())),
            None => Ok(self.chat.clone()),
        }
    }
}

/// Config with a short debounce and the static progress status
pub fn test_config() -> Config {
    Config {
        openai_key: Some("test-key".to_string()),
        debounce: 50,
        enable_progress_spinner: false,
        completion_timeout: 2000,
        action_timeout: 2000,
        ..Config::default()
    }
}

pub fn registry_with(backend: StubBackend) -> BackendRegistry {
    let registry = BackendRegistry::new();
    registry.register("stub", Arc::new(backend));
    registry.select("stub").unwrap();
    registry
}

/// The client end of a running server
pub struct TestClient {
    writer: FrameWriter,
    reader: FrameReader<BufReader<ReadHalf<DuplexStream>>>,
    server: JoinHandle<Result<SessionEnd, CodecError>>,
    /// Responses read while waiting for a different one
    early: Vec<Message>,
}

pub fn spawn_server(config: Config, registry: BackendRegistry) -> TestClient {
    let (client, server) = tokio::io::duplex(1024 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let (client_read, client_write) = tokio::io::split(client);

    let dispatcher = build_dispatcher(Arc::new(config), Arc::new(registry));
    let server = tokio::spawn(serve(BufReader::new(server_read), server_write, dispatcher));

    TestClient {
        writer: FrameWriter::new(client_write),
        reader: FrameReader::new(BufReader::new(client_read)),
        server,
        early: Vec::new(),
    }
}

impl TestClient {
    pub async fn send(&self, message: Message) {
        self.writer.write_message(&message).await.unwrap();
    }

    pub async fn send_raw(&self, bytes: &[u8]) {
        self.writer.write_frame(bytes).await.unwrap();
    }

    pub async fn request(&self, id: i64, method: &str, params: Value) {
        self.send(Message::request(Id::Number(id), method, params)).await;
    }

    pub async fn notify(&self, method: &str, params: Value) {
        self.send(Message::notification(method, params)).await;
    }

    pub async fn next_message(&mut self) -> Message {
        tokio::time::timeout(WAIT, self.reader.read_message())
            .await
            .expect("timed out waiting for a message")
            .unwrap()
            .expect("server closed its output")
    }

    /// Waits for the response to request `id`, collecting everything else
    pub async fn response(&mut self, id: i64, skipped: &mut Vec<Message>) -> Message {
        let id = Some(Id::Number(id));
        if let Some(index) = self.early.iter().position(|message| message.id == id) {
            return self.early.remove(index);
        }

        loop {
            let message = self.next_message().await;
            if message.method.is_none() {
                if message.id == id {
                    return message;
                }
                self.early.push(message);
                continue;
            }
            skipped.push(message);
        }
    }

    pub async fn wait_for_response(&mut self, id: i64) -> Message {
        self.response(id, &mut Vec::new()).await
    }

    pub async fn wait_for_method(&mut self, method: &str) -> Message {
        loop {
            let message = self.next_message().await;
            if message.method() == method {
                return message;
            }
        }
    }

    pub async fn initialize(&mut self) -> Message {
        self.request(1, "initialize", json!({"capabilities": {}})).await;
        let response = self.wait_for_response(1).await;
        self.notify("initialized", json!({})).await;
        response
    }

    pub async fn open(&self, uri: &str, language_id: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({"textDocument": {
                "uri": uri,
                "languageId": language_id,
                "version": version,
                "text": text
            }}),
        )
        .await;
    }

    pub async fn change(&self, uri: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didChange",
            json!({
                "textDocument": {"uri": uri, "version": version},
                "contentChanges": [{"text": text}]
            }),
        )
        .await;
    }

    pub async fn completion(&self, id: i64, uri: &str, line: u32, character: u32) {
        self.request(
            id,
            "textDocument/completion",
            json!({
                "textDocument": {"uri": uri},
                "position": {"line": line, "character": character}
            }),
        )
        .await;
    }

    /// Waits for the server loop to stop on its own, keeping the streams open
    pub async fn stopped(mut self) -> SessionEnd {
        tokio::time::timeout(WAIT, &mut self.server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap()
    }

    /// Closes the client side and returns how the server loop finished
    pub async fn finish(self) -> SessionEnd {
        let TestClient {
            writer,
            reader,
            server,
            ..
        } = self;
        drop(writer);
        drop(reader);

        tokio::time::timeout(WAIT, server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap()
    }
}

/// Completion items of a completion response
pub fn completion_items(response: &Message) -> Vec<tower_lsp::lsp_types::CompletionItem> {
    let result = response.result.clone().expect("completion response without result");
    let list: tower_lsp::lsp_types::CompletionList = serde_json::from_value(result).unwrap();
    assert!(!list.is_incomplete);
    list.items
}
