//! Debounced completions from the selected backend

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tower_lsp::jsonrpc::Error as RpcError;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionList, CompletionParams, CompletionResponse, Diagnostic,
    DiagnosticSeverity, MessageType, Position, Range,
};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendRegistry, CompletionRequest, Deadline};
use crate::config::Config;
use crate::edit::{CursorContext, synthesize};
use crate::lsp::dispatcher::Handler;
use crate::lsp::documents::Document;
use crate::lsp::error::HandlerError;
use crate::lsp::message::Message;
use crate::lsp::progress::ProgressSignal;
use crate::lsp::session::Session;
use crate::util::Debouncer;

const DEBOUNCE_KEY: &str = "completion";

/// Extra time a backend gets past the deadline to hand back partial results
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Answers `textDocument/completion`.
///
/// Requests are debounced under a single key; a request replaced by a newer
/// one, or whose document changed while it waited, is answered with an empty
/// list so every request still gets exactly one response.
pub struct CompletionHandler {
    config: Arc<Config>,
    registry: Arc<BackendRegistry>,
    debouncer: Debouncer,
}

impl CompletionHandler {
    pub fn new(config: Arc<Config>, registry: Arc<BackendRegistry>) -> Self {
        Self {
            config,
            registry,
            debouncer: Debouncer::new(),
        }
    }

    /// Waits out the debounce delay. `false` if a newer request took over.
    async fn debounce(&self) -> bool {
        let (fire, fired) = oneshot::channel();
        self.debouncer.schedule(
            DEBOUNCE_KEY,
            async move {
                let _ = fire.send(());
            },
            self.config.debounce_delay(),
        );
        fired.await.is_ok()
    }

    async fn complete(&self, session: &Arc<Session>, params: CompletionParams) -> Vec<CompletionItem> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some(document) = session.documents().get(&uri) else {
            debug!(uri = %uri, "Completion for unknown document");
            return vec![];
        };
        let seen_version = document.version;

        let context = CursorContext::new(&document.text, position.line, position.character);
        if context.last_char == Some('.') {
            debug!("Skipping completion after '.'");
            return vec![];
        }

        if !self.debounce().await {
            debug!("Completion superseded by a newer request");
            return vec![];
        }

        let Some(document) = session.documents().get(&uri) else {
            return vec![];
        };
        if is_stale(session, &document, seen_version) {
            return vec![];
        }

        self.fetch(session, &document, position, seen_version).await
    }

    async fn fetch(
        &self,
        session: &Arc<Session>,
        document: &Document,
        position: Position,
        seen_version: i32,
    ) -> Vec<CompletionItem> {
        let context = CursorContext::new(&document.text, position.line, position.character);
        let cursor_line = Range::new(
            Position::new(position.line, 0),
            Position::new(position.line + 1, 0),
        );

        let progress = match self.start_progress(session, cursor_line).await {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Failed to show completion progress: {}", e);
                None
            }
        };

        // The document may have changed while progress was being shown
        if is_stale(session, document, seen_version) {
            stop_progress(progress).await;
            return vec![];
        }

        let timeout = self.config.completion_timeout();
        let deadline = Deadline::after(timeout);
        let request = CompletionRequest {
            content_before: context.before.clone(),
            content_after: context.after_cursor(),
            deadline: Some(deadline),
        };

        debug!(uri = %document.uri, language = %document.language_id, "Calling completion");
        let result = tokio::time::timeout_at(
            deadline.at() + DEADLINE_GRACE,
            self.registry.completion(
                &request,
                document.uri.as_str(),
                &document.language_id,
                self.config.num_suggestions,
            ),
        )
        .await
        .unwrap_or(Err(BackendError::Timeout(timeout)));

        stop_progress(progress).await;

        match result {
            Ok(suggestions) => {
                info!(count = suggestions.len(), "Received completion suggestions");
                suggestions
                    .iter()
                    .map(|raw| synthesize(raw, &context, position).into_completion_item())
                    .collect()
            }
            Err(e) => {
                warn!("Completion failed: {}", e);
                let diagnostic = Diagnostic {
                    range: cursor_line,
                    severity: Some(DiagnosticSeverity::ERROR),
                    message: e.to_string(),
                    ..Default::default()
                };
                if let Err(e) = session
                    .publish_diagnostics(vec![diagnostic], timeout)
                    .await
                {
                    warn!("Failed to publish completion error: {}", e);
                }
                vec![]
            }
        }
    }

    async fn start_progress(
        &self,
        session: &Arc<Session>,
        anchor: Range,
    ) -> Result<Option<ProgressSignal>, HandlerError> {
        if !self.config.enable_progress_spinner {
            session
                .show_message(MessageType::INFO, "Fetching completion...")
                .await?;
            return Ok(None);
        }

        let progress = ProgressSignal::new(
            Arc::clone(session),
            self.config.progress_style,
            self.config.progress_interval(),
            "Fetching completion",
            anchor,
            self.config.completion_timeout(),
        );
        progress.start().await?;
        Ok(Some(progress))
    }
}

/// `true` if the document got a newer version than the request was made for
fn is_stale(session: &Session, document: &Document, seen_version: i32) -> bool {
    let Some(current_version) = session.documents().version(&document.uri) else {
        debug!(uri = %document.uri, "Document closed while completing");
        return true;
    };
    if current_version > seen_version {
        info!(
            seen_version,
            current_version, "Skipping completion, document is stale"
        );
        return true;
    }
    false
}

async fn stop_progress(progress: Option<ProgressSignal>) {
    if let Some(progress) = progress {
        if let Err(e) = progress.stop().await {
            warn!("Failed to clear completion progress: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl Handler for CompletionHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        let params: CompletionParams = match message.parse_params() {
            Ok(params) => params,
            Err(e) => {
                session
                    .respond_error(message.id.clone(), RpcError::invalid_params(e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        let items = self.complete(&session, params).await;

        session
            .respond(
                message.id.clone(),
                CompletionResponse::List(CompletionList {
                    is_incomplete: false,
                    items,
                }),
            )
            .await
    }
}
