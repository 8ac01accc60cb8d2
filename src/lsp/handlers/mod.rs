//! Handlers registered with the dispatcher
//! - lifecycle.rs: initialize, initialized, shutdown, exit
//! - text_sync.rs: didOpen, didChange, didClose
//! - completion.rs: debounced backend completions
//! - actions.rs: code actions and the commands they run

pub mod actions;
pub mod completion;
pub mod lifecycle;
pub mod text_sync;

pub use actions::{CodeActionHandler, CommandArgument, CommandKind, ExecuteCommandHandler};
pub use completion::CompletionHandler;
pub use lifecycle::{ExitHandler, InitializeHandler, InitializedHandler, ShutdownHandler};
pub use text_sync::{DidChangeHandler, DidCloseHandler, DidOpenHandler};
