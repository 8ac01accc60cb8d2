//! Code actions that rewrite a selection through the chat backend

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_lsp::jsonrpc::Error as RpcError;
use tower_lsp::lsp_types::request::ApplyWorkspaceEdit;
use tower_lsp::lsp_types::{
    ApplyWorkspaceEditParams, CodeAction, CodeActionKind, CodeActionOrCommand, CodeActionParams,
    Command, Diagnostic, DiagnosticSeverity, ExecuteCommandParams, Range, TextEdit, WorkspaceEdit,
};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendRegistry, ChatRequest};
use crate::config::Config;
use crate::lsp::dispatcher::Handler;
use crate::lsp::error::HandlerError;
use crate::lsp::message::Message;
use crate::lsp::progress::ProgressSignal;
use crate::lsp::session::Session;
use crate::util::text::{indent, min_indent};

/// Commands offered as code actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ResolveDiagnostics,
    GenerateDocs,
    ImproveCode,
    RefactorFromComment,
    WriteTest,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::ResolveDiagnostics,
        CommandKind::GenerateDocs,
        CommandKind::ImproveCode,
        CommandKind::RefactorFromComment,
        CommandKind::WriteTest,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CommandKind::ResolveDiagnostics => "resolveDiagnostics",
            CommandKind::GenerateDocs => "generateDocs",
            CommandKind::ImproveCode => "improveCode",
            CommandKind::RefactorFromComment => "refactorFromComment",
            CommandKind::WriteTest => "writeTest",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CommandKind::ResolveDiagnostics => "Resolve diagnostics",
            CommandKind::GenerateDocs => "Generate documentation",
            CommandKind::ImproveCode => "Improve code",
            CommandKind::RefactorFromComment => "Refactor code from a comment",
            CommandKind::WriteTest => "Write a unit test",
        }
    }

    /// Instruction sent to the backend when the client supplies none
    pub fn instruction(self) -> &'static str {
        match self {
            CommandKind::ResolveDiagnostics => "Resolve the diagnostics for this code.",
            CommandKind::GenerateDocs => "Add documentation to this code.",
            CommandKind::ImproveCode => "Improve this code.",
            CommandKind::RefactorFromComment => "Refactor this code based on the comment.",
            CommandKind::WriteTest => {
                "Write a unit test for this code. Do not include any imports."
            }
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn keys() -> Vec<String> {
        Self::ALL.iter().map(|kind| kind.key().to_string()).collect()
    }
}

/// First argument of every command this server hands out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArgument {
    pub range: Range,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

/// Appends the client's diagnostics to an instruction
fn with_diagnostics(instruction: &str, diagnostics: &[String]) -> String {
    if diagnostics.is_empty() {
        return instruction.to_string();
    }
    format!("{}\n\nDiagnostics: {}", instruction, diagnostics.join("\n- "))
}

/// Answers `textDocument/codeAction` with one quickfix per command
pub struct CodeActionHandler;

impl CodeActionHandler {
    fn actions(params: &CodeActionParams) -> Vec<CodeActionOrCommand> {
        let diagnostics: Vec<String> = params
            .context
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message.clone())
            .collect();

        CommandKind::ALL
            .into_iter()
            .map(|kind| {
                let argument = CommandArgument {
                    range: params.range,
                    query: kind.instruction().to_string(),
                    diagnostics: diagnostics.clone(),
                };

                CodeActionOrCommand::CodeAction(CodeAction {
                    title: kind.label().to_string(),
                    kind: Some(CodeActionKind::QUICKFIX),
                    diagnostics: Some(vec![]),
                    command: Some(Command {
                        title: kind.label().to_string(),
                        command: kind.key().to_string(),
                        arguments: serde_json::to_value(argument).ok().map(|arg| vec![arg]),
                    }),
                    ..Default::default()
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Handler for CodeActionHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        let params: CodeActionParams = match message.parse_params() {
            Ok(params) => params,
            Err(e) => {
                session
                    .respond_error(message.id.clone(), RpcError::invalid_params(e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        // executeCommand arrives without a document, so remember this one
        session
            .documents()
            .set_current_uri(params.text_document.uri.clone());

        session
            .respond(message.id.clone(), Self::actions(&params))
            .await
    }
}

/// Runs a command from a code action against the current document
pub struct ExecuteCommandHandler {
    config: Arc<Config>,
    registry: Arc<BackendRegistry>,
}

impl ExecuteCommandHandler {
    pub fn new(config: Arc<Config>, registry: Arc<BackendRegistry>) -> Self {
        Self { config, registry }
    }

    async fn execute(
        &self,
        session: &Arc<Session>,
        params: ExecuteCommandParams,
    ) -> Result<(), HandlerError> {
        let Some(first) = params.arguments.into_iter().next() else {
            warn!(command = %params.command, "executeCommand without arguments");
            return Ok(());
        };
        let argument: CommandArgument =
            serde_json::from_value(first).map_err(|source| HandlerError::InvalidParams {
                method: "workspace/executeCommand".to_string(),
                source,
            })?;

        let kind = CommandKind::from_key(&params.command);
        let instruction = match (argument.query.is_empty(), kind) {
            (false, _) => argument.query.clone(),
            (true, Some(kind)) => kind.instruction().to_string(),
            (true, None) => {
                warn!(command = %params.command, "Unknown command without a query");
                return Ok(());
            }
        };

        let Some(uri) = session.documents().current_uri() else {
            warn!(command = %params.command, "executeCommand without a current document");
            return Ok(());
        };
        let Some(document) = session.documents().get(&uri) else {
            warn!(uri = %uri, "Current document is not open");
            return Ok(());
        };

        let progress = self.start_progress(session, &params.command, argument.range).await?;

        let content = session.documents().text_in_range(&uri, argument.range);
        let padding = min_indent(&content);
        let request = ChatRequest {
            instruction: with_diagnostics(&instruction, &argument.diagnostics),
            content,
        };

        debug!(command = %params.command, uri = %uri, "Requesting chat rewrite");
        let timeout = self.config.action_timeout();
        let result = tokio::time::timeout(
            timeout,
            self.registry
                .chat(&request, uri.as_str(), &document.language_id),
        )
        .await
        .unwrap_or(Err(BackendError::Timeout(timeout)));

        if let Some(progress) = progress {
            progress.stop().await?;
        }

        let rewritten = match result {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return self.report(session, &BackendError::NoCompletion, argument.range).await,
            Err(e) => return self.report(session, &e, argument.range).await,
        };

        let replacement = format!("{}\n", indent(rewritten.trim(), padding));
        let edit = WorkspaceEdit::new(HashMap::from([(
            uri.clone(),
            vec![TextEdit::new(argument.range, replacement)],
        )]));

        info!(command = %params.command, uri = %uri, "Applying chat rewrite");
        session
            .request::<ApplyWorkspaceEdit>(ApplyWorkspaceEditParams {
                label: Some(params.command.clone()),
                edit,
            })
            .await?;

        session.reset_diagnostics().await
    }

    /// Shows that the command is running, animated or as a single diagnostic
    async fn start_progress(
        &self,
        session: &Arc<Session>,
        command: &str,
        range: Range,
    ) -> Result<Option<ProgressSignal>, HandlerError> {
        let title = format!("Executing {}...", command);

        if !self.config.enable_progress_spinner {
            session
                .publish_diagnostics(
                    vec![Diagnostic {
                        range,
                        severity: Some(DiagnosticSeverity::INFORMATION),
                        message: title,
                        ..Default::default()
                    }],
                    self.config.action_timeout(),
                )
                .await?;
            return Ok(None);
        }

        let progress = ProgressSignal::new(
            Arc::clone(session),
            self.config.progress_style,
            self.config.progress_interval(),
            &title,
            range,
            self.config.action_timeout(),
        );
        progress.start().await?;
        Ok(Some(progress))
    }

    async fn report(
        &self,
        session: &Arc<Session>,
        error: &BackendError,
        range: Range,
    ) -> Result<(), HandlerError> {
        warn!("Chat request failed: {}", error);
        session
            .publish_diagnostics(
                vec![Diagnostic {
                    range,
                    severity: Some(DiagnosticSeverity::ERROR),
                    message: error.to_string(),
                    ..Default::default()
                }],
                self.config.action_timeout(),
            )
            .await
    }
}

#[async_trait::async_trait]
impl Handler for ExecuteCommandHandler {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>) -> Result<(), HandlerError> {
        let outcome = match message.parse_params::<ExecuteCommandParams>() {
            Ok(params) => self.execute(&session, params).await,
            Err(e) => Err(e),
        };

        // The edit travels as a separate applyEdit request; the command itself answers null
        match &outcome {
            Err(e @ HandlerError::InvalidParams { .. }) => {
                session
                    .respond_error(message.id.clone(), RpcError::invalid_params(e.to_string()))
                    .await?
            }
            _ => session.respond(message.id.clone(), Value::Null).await?,
        }

        outcome
    }
}
