use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Stream I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode message body: {source}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },

    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
}

impl CodecError {
    /// Returns true if the read loop can skip the offending frame and keep going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CodecError::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid params for {method}: {source}")]
    InvalidParams {
        method: String,
        source: serde_json::Error,
    },

    #[error("Failed to write to client: {0}")]
    Transport(#[from] CodecError),

    #[error("Handler panicked: {0}")]
    Fault(String),
}
