use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, error, info, warn};

use crate::backend::BackendRegistry;
use crate::config::Config;
use crate::lsp::codec::{FrameReader, FrameWriter};
use crate::lsp::dispatcher::Dispatcher;
use crate::lsp::error::CodecError;
use crate::lsp::handlers::lifecycle::server_capabilities;
use crate::lsp::handlers::{
    CodeActionHandler, CompletionHandler, DidChangeHandler, DidCloseHandler, DidOpenHandler,
    ExecuteCommandHandler, ExitHandler, InitializeHandler, InitializedHandler, ShutdownHandler,
};
use crate::lsp::session::Session;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent `exit`
    Exit { shutdown_requested: bool },
    /// The input stream closed between frames
    EndOfInput,
}

impl SessionEnd {
    /// Process exit code: `exit` without a prior `shutdown` is a failure
    pub fn exit_code(self) -> u8 {
        match self {
            SessionEnd::Exit {
                shutdown_requested: false,
            } => 1,
            _ => 0,
        }
    }
}

/// Routes every method this server understands
pub fn build_dispatcher(config: Arc<Config>, registry: Arc<BackendRegistry>) -> Dispatcher {
    let capabilities = server_capabilities(config.trigger_characters());

    let mut dispatcher = Dispatcher::new();
    dispatcher.register("initialize", Arc::new(InitializeHandler::new(capabilities)));
    dispatcher.register("initialized", Arc::new(InitializedHandler));
    dispatcher.register("shutdown", Arc::new(ShutdownHandler));
    dispatcher.register("exit", Arc::new(ExitHandler));
    dispatcher.register_ordered("textDocument/didOpen", Arc::new(DidOpenHandler));
    dispatcher.register_ordered("textDocument/didChange", Arc::new(DidChangeHandler));
    dispatcher.register_ordered("textDocument/didClose", Arc::new(DidCloseHandler));
    dispatcher.register(
        "textDocument/completion",
        Arc::new(CompletionHandler::new(Arc::clone(&config), Arc::clone(&registry))),
    );
    dispatcher.register("textDocument/codeAction", Arc::new(CodeActionHandler));
    dispatcher.register(
        "workspace/executeCommand",
        Arc::new(ExecuteCommandHandler::new(config, registry)),
    );
    dispatcher
}

/// Reads frames until `exit`, end of input, or a stream failure.
///
/// Document sync messages are applied before the next frame is read, so any
/// later request sees them. Everything else is handed to the dispatcher
/// without waiting for its handlers.
pub async fn serve<R, W>(
    input: R,
    output: W,
    dispatcher: Dispatcher,
) -> Result<SessionEnd, CodecError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let session = Arc::new(Session::new(FrameWriter::new(output)));
    let mut reader = FrameReader::new(input);

    loop {
        let read = tokio::select! {
            biased;
            _ = session.exited() => {
                return Ok(SessionEnd::Exit {
                    shutdown_requested: session.shutdown_requested(),
                });
            }
            read = reader.read_message() => read,
        };

        match read {
            Ok(Some(message)) => {
                // Document bodies are too large to log on every keystroke
                match message.method() {
                    "textDocument/didOpen" | "textDocument/didChange" => {
                        debug!(method = message.method(), "Received message")
                    }
                    _ => debug!(
                        method = message.method(),
                        id = ?message.id,
                        params = ?message.params,
                        "Received message"
                    ),
                }
                let ordered = dispatcher.is_ordered(message.method());
                let handles = dispatcher.emit(&session, message);
                if ordered {
                    for handle in handles {
                        if let Err(e) = handle.await {
                            warn!("Document sync task failed: {}", e);
                        }
                    }
                }
            }
            Ok(None) => {
                info!("Input closed");
                return Ok(SessionEnd::EndOfInput);
            }
            Err(e) if e.is_recoverable() => {
                warn!("Skipping unreadable message: {}", e);
            }
            Err(e) => {
                error!("Failed to read from client: {}", e);
                return Err(e);
            }
        }
    }
}

pub async fn run_server(config: Config, registry: BackendRegistry) -> anyhow::Result<SessionEnd> {
    info!("Starting assist-lsp server");

    let dispatcher = build_dispatcher(Arc::new(config), Arc::new(registry));
    let end = serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        dispatcher,
    )
    .await?;

    info!(?end, "assist-lsp server stopped");
    Ok(end)
}
