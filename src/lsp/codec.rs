//! Content-Length framing over byte streams.
//!
//! Each frame is `Content-Length: <n>\r\n\r\n<body>` where body is exactly
//! `n` bytes of UTF-8 JSON. Other header lines are tolerated and ignored.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::lsp::error::CodecError;
use crate::lsp::message::Message;

const CONTENT_LENGTH: &str = "Content-Length";

/// Reads frames one at a time from the client's output stream
pub struct FrameReader<R> {
    reader: R,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next frame body.
    ///
    /// # Returns
    /// * `Ok(Some(body))` - The raw JSON body of the next usable frame
    /// * `Ok(None)` - The stream ended cleanly between frames
    /// * `Err(CodecError::Io)` - The stream failed or ended inside a frame
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        loop {
            let Some(content_length) = self.read_headers().await? else {
                return Ok(None);
            };

            let Some(content_length) = content_length.filter(|len| *len > 0) else {
                debug!("Skipping frame without usable Content-Length");
                continue;
            };

            let mut body = vec![0u8; content_length];
            self.reader.read_exact(&mut body).await?;
            trace!(body_len = content_length, "Read frame");

            return Ok(Some(body));
        }
    }

    /// Reads and decodes the next message.
    ///
    /// A body that is not valid JSON yields `CodecError::Decode`; the stream
    /// is still positioned at the next frame, so the caller may keep reading.
    pub async fn read_message(&mut self) -> Result<Option<Message>, CodecError> {
        let Some(body) = self.read_frame().await? else {
            return Ok(None);
        };

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| CodecError::Decode {
                source,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
    }

    /// Consumes one header block.
    ///
    /// Returns `None` on EOF before any header line, otherwise the parsed
    /// Content-Length (`Some(None)` when absent or unparsable).
    async fn read_headers(&mut self) -> Result<Option<Option<usize>>, CodecError> {
        let mut content_length = None;
        let mut saw_header = false;
        let mut line = Vec::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

            if bytes_read == 0 {
                if saw_header {
                    return Err(CodecError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "stream ended inside a header block",
                    )));
                }
                return Ok(None);
            }

            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();

            // Empty line signals end of headers
            if trimmed.is_empty() {
                return Ok(Some(content_length));
            }

            saw_header = true;

            let Some((name, value)) = trimmed.split_once(':') else {
                warn!("Ignoring malformed header line: {}", trimmed);
                continue;
            };

            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                content_length = value
                    .trim()
                    .parse::<usize>()
                    .inspect_err(|e| warn!("Invalid Content-Length {:?}: {}", value, e))
                    .ok();
            }
        }
    }
}

/// Shared, cloneable writer that frames messages for the client.
///
/// Header and body of one frame are written under a single lock so concurrent
/// handlers never interleave their bytes.
#[derive(Clone)]
pub struct FrameWriter {
    inner: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl FrameWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub async fn write_frame(&self, body: &[u8]) -> Result<(), CodecError> {
        let header = format!("{}: {}\r\n\r\n", CONTENT_LENGTH, body.len());

        let mut writer = self.inner.lock().await;
        writer.write_all(header.as_bytes()).await?;
        writer.write_all(body).await?;
        writer.flush().await?;

        trace!(body_len = body.len(), "Wrote frame");
        Ok(())
    }

    pub async fn write_message(&self, message: &Message) -> Result<(), CodecError> {
        let body = serde_json::to_vec(message).map_err(CodecError::Encode)?;
        self.write_frame(&body).await
    }
}
