//! Per-connection state shared by every handler

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tower_lsp::jsonrpc::{Error as RpcError, Id};
use tower_lsp::lsp_types::notification::{
    Notification, Progress, PublishDiagnostics, ShowMessage,
};
use tower_lsp::lsp_types::request::Request;
use tower_lsp::lsp_types::{
    Diagnostic, MessageType, ProgressParams, ProgressParamsValue, ProgressToken,
    PublishDiagnosticsParams, ShowMessageParams, Url, WorkDoneProgress,
};
use tracing::{debug, warn};

use crate::lsp::codec::FrameWriter;
use crate::lsp::documents::DocumentStore;
use crate::lsp::error::{CodecError, HandlerError};
use crate::lsp::message::Message;

/// `source` attached to every diagnostic this server publishes
pub const DIAGNOSTIC_SOURCE: &str = "assist-lsp";

/// Client-facing half of a connection: the output stream, open documents and
/// lifecycle flags.
pub struct Session {
    writer: FrameWriter,
    documents: DocumentStore,
    /// Bumped on every publish for a uri; an expiry only clears its own publish
    diagnostic_generations: Mutex<HashMap<Url, u64>>,
    next_request_id: AtomicI64,
    shutdown_requested: AtomicBool,
    exit: Notify,
}

impl Session {
    pub fn new(writer: FrameWriter) -> Self {
        Self {
            writer,
            documents: DocumentStore::new(),
            diagnostic_generations: Mutex::new(HashMap::new()),
            next_request_id: AtomicI64::new(1),
            shutdown_requested: AtomicBool::new(false),
            exit: Notify::new(),
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub async fn send(&self, message: &Message) -> Result<(), CodecError> {
        self.writer.write_message(message).await
    }

    pub async fn respond<T: Serialize>(&self, id: Option<Id>, result: T) -> Result<(), HandlerError> {
        let result = serde_json::to_value(result).map_err(CodecError::Encode)?;
        self.send(&Message::response(id, result)).await?;
        Ok(())
    }

    pub async fn respond_error(&self, id: Option<Id>, error: RpcError) -> Result<(), HandlerError> {
        self.send(&Message::error_response(id, error)).await?;
        Ok(())
    }

    pub async fn notify<N: Notification>(&self, params: N::Params) -> Result<(), HandlerError> {
        let params = serde_json::to_value(params).map_err(CodecError::Encode)?;
        self.send(&Message::notification(N::METHOD, params)).await?;
        Ok(())
    }

    /// Sends a server-to-client request and returns its id.
    ///
    /// Client responses are not correlated back; the read loop drops them.
    pub async fn request<R: Request>(&self, params: R::Params) -> Result<Id, HandlerError> {
        let id = Id::Number(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let params = serde_json::to_value(params).map_err(CodecError::Encode)?;
        self.send(&Message::request(id.clone(), R::METHOD, params)).await?;
        Ok(id)
    }

    pub async fn show_message(&self, typ: MessageType, message: &str) -> Result<(), HandlerError> {
        self.notify::<ShowMessage>(ShowMessageParams {
            typ,
            message: message.to_string(),
        })
        .await
    }

    /// Publishes diagnostics for the current document.
    ///
    /// With a non-zero `lifetime` an empty publish for the same uri follows
    /// after that long, unless something else was published for the uri in
    /// the meantime. Nothing is sent when no document is current.
    pub async fn publish_diagnostics(
        self: &Arc<Self>,
        diagnostics: Vec<Diagnostic>,
        lifetime: Duration,
    ) -> Result<(), HandlerError> {
        let Some(uri) = self.documents.current_uri() else {
            debug!("No current document, dropping {} diagnostics", diagnostics.len());
            return Ok(());
        };

        let diagnostics = diagnostics
            .into_iter()
            .map(|diagnostic| Diagnostic {
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                ..diagnostic
            })
            .collect();

        let mut generations = self.diagnostic_generations.lock().await;
        let generation = bump(&mut generations, &uri);
        self.notify::<PublishDiagnostics>(PublishDiagnosticsParams::new(
            uri.clone(),
            diagnostics,
            None,
        ))
        .await?;
        drop(generations);

        if !lifetime.is_zero() {
            let session = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(lifetime).await;
                session.expire_diagnostics(uri, generation).await;
            });
        }

        Ok(())
    }

    async fn expire_diagnostics(&self, uri: Url, generation: u64) {
        let mut generations = self.diagnostic_generations.lock().await;
        if generations.get(&uri) != Some(&generation) {
            debug!(uri = %uri, "Diagnostics were replaced, skipping expiry");
            return;
        }
        bump(&mut generations, &uri);

        let cleared = self
            .notify::<PublishDiagnostics>(PublishDiagnosticsParams::new(uri, vec![], None))
            .await;
        if let Err(e) = cleared {
            warn!("Failed to clear expired diagnostics: {}", e);
        }
    }

    /// Clears all diagnostics of the current document
    pub async fn reset_diagnostics(&self) -> Result<(), HandlerError> {
        let Some(uri) = self.documents.current_uri() else {
            return Ok(());
        };

        let mut generations = self.diagnostic_generations.lock().await;
        bump(&mut generations, &uri);
        self.notify::<PublishDiagnostics>(PublishDiagnosticsParams::new(uri, vec![], None))
            .await
    }

    pub async fn progress(
        &self,
        token: ProgressToken,
        progress: WorkDoneProgress,
    ) -> Result<(), HandlerError> {
        self.notify::<Progress>(ProgressParams {
            token,
            value: ProgressParamsValue::WorkDone(progress),
        })
        .await
    }

    /// Hands out ids for work-done progress tokens
    pub fn next_token(&self) -> ProgressToken {
        ProgressToken::String(format!(
            "assist-lsp/{}",
            self.next_request_id.fetch_add(1, Ordering::Relaxed)
        ))
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Signals the read loop to stop
    pub fn request_exit(&self) {
        self.exit.notify_one();
    }

    /// Resolves once `request_exit` has been called, even if it was called first
    pub async fn exited(&self) {
        self.exit.notified().await;
    }
}

fn bump(generations: &mut HashMap<Url, u64>, uri: &Url) -> u64 {
    let generation = generations.entry(uri.clone()).or_default();
    *generation += 1;
    *generation
}
