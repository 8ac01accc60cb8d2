// LSP protocol layer
// - codec.rs: Content-Length framing over async streams
// - message.rs: JSON-RPC envelope
// - error.rs: CodecError, HandlerError
// - session.rs: output stream, documents and lifecycle flags of a connection
// - documents.rs: open documents and the current document
// - dispatcher.rs: method routing with supervised handler tasks
// - progress.rs: spinner status while a backend call runs
// - handlers/: lifecycle, text sync, completion, code actions
// - server.rs: read loop and stdio entry point

pub mod codec;
pub mod dispatcher;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod message;
pub mod progress;
pub mod server;
pub mod session;
