use std::sync::Arc;

use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
};
use tracing::{debug, warn};

use crate::lsp::dispatcher::Handler;
use crate::lsp::documents::{Document, Update};
use crate::lsp::error::HandlerError;
use crate::lsp::message::Message;
use crate::lsp::session::Session;

pub struct DidOpenHandler;

#[async_trait::async_trait]
impl Handler for DidOpenHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        let params: DidOpenTextDocumentParams = message.parse_params()?;
        let item = params.text_document;

        debug!(uri = %item.uri, language = %item.language_id, "Document opened");

        session.documents().insert(Document {
            uri: item.uri,
            text: item.text,
            version: item.version,
            language_id: item.language_id,
        });
        Ok(())
    }
}

/// Full-text sync: the first content change carries the whole new text
pub struct DidChangeHandler;

#[async_trait::async_trait]
impl Handler for DidChangeHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        let params: DidChangeTextDocumentParams = message.parse_params()?;
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        let Some(change) = params.content_changes.into_iter().next() else {
            debug!(uri = %uri, version, "didChange without content changes");
            return Ok(());
        };

        match session.documents().update_text(&uri, version, change.text) {
            Update::Applied => debug!(uri = %uri, version, "Document changed"),
            Update::Unknown => warn!(uri = %uri, "didChange for a document that was never opened"),
            Update::Outdated { stored } => {
                warn!(uri = %uri, version, stored, "Ignoring didChange older than stored version")
            }
        }
        Ok(())
    }
}

pub struct DidCloseHandler;

#[async_trait::async_trait]
impl Handler for DidCloseHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        let params: DidCloseTextDocumentParams = message.parse_params()?;
        let uri = params.text_document.uri;

        session.documents().remove(&uri);
        debug!(uri = %uri, "Document closed");
        Ok(())
    }
}
