use std::sync::Arc;

use serde_json::Value;
use tower_lsp::lsp_types::{
    CodeActionProviderCapability, CompletionOptions, ExecuteCommandOptions, InitializeResult,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions,
};
use tracing::info;

use crate::lsp::dispatcher::Handler;
use crate::lsp::error::HandlerError;
use crate::lsp::handlers::actions::CommandKind;
use crate::lsp::message::Message;
use crate::lsp::session::Session;

pub fn server_capabilities(trigger_characters: Vec<String>) -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                ..Default::default()
            },
        )),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(trigger_characters),
            ..Default::default()
        }),
        code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: CommandKind::keys(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub struct InitializeHandler {
    capabilities: ServerCapabilities,
}

impl InitializeHandler {
    pub fn new(capabilities: ServerCapabilities) -> Self {
        Self { capabilities }
    }
}

#[async_trait::async_trait]
impl Handler for InitializeHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        info!("LSP server initializing");

        session
            .respond(
                message.id.clone(),
                InitializeResult {
                    capabilities: self.capabilities.clone(),
                    server_info: Some(ServerInfo {
                        name: "assist-lsp".to_string(),
                        version: Some(env!("CARGO_PKG_VERSION").to_string()),
                    }),
                },
            )
            .await
    }
}

pub struct InitializedHandler;

#[async_trait::async_trait]
impl Handler for InitializedHandler {
    async fn handle(&self, _: Arc<Session>, _: Arc<Message>) -> Result<(), HandlerError> {
        info!("LSP server initialized");
        Ok(())
    }
}

pub struct ShutdownHandler;

#[async_trait::async_trait]
impl Handler for ShutdownHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        info!("LSP server shutting down");
        session.request_shutdown();
        session.respond(message.id.clone(), Value::Null).await
    }
}

pub struct ExitHandler;

#[async_trait::async_trait]
impl Handler for ExitHandler {
    async fn handle(&self, session: Arc<Session>, _: Arc<Message>) -> Result<(), HandlerError> {
        info!(
            shutdown_requested = session.shutdown_requested(),
            "Received exit notification"
        );
        session.request_exit();
        Ok(())
    }
}
