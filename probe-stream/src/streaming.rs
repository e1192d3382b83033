//! NDJSON streaming support for the Ollama Generate API.
//!
//! With `stream: true` Ollama emits one JSON object per line:
//! ```text
//! {"model":"llama2","response":"Hel","done":false}
//! {"model":"llama2","response":"lo","done":false}
//! {"model":"llama2","response":"","done":true,"done_reason":"stop","eval_count":2,"total_duration":1200000}
//! ```
//!
//! [`read_incremental`] turns such a body into [`ReadEvent::Fragment`]s
//! followed by one [`ReadEvent::Done`]; [`read_all`] drives it to completion.
//! Both stop reading at the first chunk with `done: true`.
//!
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion>

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Response;

use crate::error::GenerateError;
use crate::types::{ResponseChunk, StreamResult};

/// One item of an incremental read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A non-empty text fragment, in arrival order.
    Fragment(String),
    /// The stream finished; always the last event.
    Done(StreamResult),
}

/// Boxed incremental read, as handed out by the client.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ReadEvent, GenerateError>> + Send>>;

/// Read a whole streaming response and return the assembled result.
///
/// A non-success status fails with [`GenerateError::RequestFailed`] without
/// decoding the body.
pub async fn read_all(response: Response) -> Result<StreamResult, GenerateError> {
    let response = check_status(response).await?;
    read_all_bytes(response.bytes_stream()).await
}

/// Read a streaming response as a lazy sequence of fragments.
///
/// The sequence ends after one `Ok(ReadEvent::Done)` or one `Err`. It is
/// single-use: dropping it closes the connection.
pub fn read_incremental(
    response: Response,
) -> impl Stream<Item = Result<ReadEvent, GenerateError>> + Send + 'static {
    async_stream::stream! {
        let response = match check_status(response).await {
            Ok(r) => r,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        let mut events = std::pin::pin!(read_incremental_bytes(response.bytes_stream()));
        while let Some(event) = events.next().await {
            yield event;
        }
    }
}

/// Like [`read_all`], over a raw body byte stream.
pub async fn read_all_bytes<S, E>(byte_stream: S) -> Result<StreamResult, GenerateError>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut events = std::pin::pin!(read_incremental_bytes(byte_stream));
    let mut text = String::new();

    while let Some(event) = events.next().await {
        match event? {
            ReadEvent::Fragment(fragment) => text.push_str(&fragment),
            ReadEvent::Done(result) => return Ok(result),
        }
    }

    // The event stream always ends with Done or an error.
    Err(GenerateError::IncompleteStream { partial: text })
}

/// Like [`read_incremental`], over a raw body byte stream.
///
/// Lines may be split across byte chunks, including inside a multi-byte
/// UTF-8 character.
pub fn read_incremental_bytes<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<ReadEvent, GenerateError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::stream! {
        let mut state = NdjsonParserState::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut received_any = false;

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) if !received_any => {
                    yield Err(GenerateError::TransportError(Box::new(e)));
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "response body interrupted");
                    yield Err(state.incomplete());
                    return;
                }
            };

            received_any |= !chunk.is_empty();
            state.push_bytes(&chunk);

            while let Some(line) = state.next_line() {
                match state.process_line(&line) {
                    Ok(events) => {
                        for event in events {
                            let done = matches!(event, ReadEvent::Done(_));
                            yield Ok(event);
                            if done {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        // The terminal chunk may arrive without a trailing newline.
        if let Some(line) = state.take_remainder() {
            match state.process_line(&line) {
                Ok(events) => {
                    for event in events {
                        let done = matches!(event, ReadEvent::Done(_));
                        yield Ok(event);
                        if done {
                            return;
                        }
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        yield Err(state.incomplete());
    }
}

async fn check_status(response: Response) -> Result<Response, GenerateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "generate request rejected");
    Err(GenerateError::RequestFailed {
        status: status.as_u16(),
        body,
    })
}

/// Tracks in-progress streaming state across NDJSON lines.
struct NdjsonParserState {
    /// Bytes received but not yet split into lines.
    line_buf: Vec<u8>,
    /// Accumulated text content across chunks.
    text_buf: String,
}

impl NdjsonParserState {
    fn new() -> Self {
        Self {
            line_buf: Vec::new(),
            text_buf: String::new(),
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.line_buf.extend_from_slice(bytes);
    }

    /// Pop the next complete line, without its `\n` or `\r\n`.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline_pos = self.line_buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.line_buf.drain(..=newline_pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Whatever is left after the last newline.
    fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.line_buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.line_buf))
        }
    }

    /// Process a single NDJSON line and return any events it produces.
    fn process_line(&mut self, line: &[u8]) -> Result<Vec<ReadEvent>, GenerateError> {
        if line.trim_ascii().is_empty() {
            return Ok(Vec::new());
        }

        let chunk: ResponseChunk = serde_json::from_slice(line).map_err(|source| {
            tracing::warn!(error = %source, "malformed NDJSON line");
            GenerateError::MalformedChunk {
                line: String::from_utf8_lossy(line).into_owned(),
                partial: std::mem::take(&mut self.text_buf),
                source,
            }
        })?;

        let mut events = Vec::new();

        if let Some(text) = chunk.response.as_deref().filter(|t| !t.is_empty()) {
            self.text_buf.push_str(text);
            events.push(ReadEvent::Fragment(text.to_string()));
        }

        if chunk.done {
            tracing::debug!(
                eval_count = ?chunk.eval_count,
                total_duration = ?chunk.total_duration,
                "received final chunk"
            );
            let text = std::mem::take(&mut self.text_buf);
            events.push(ReadEvent::Done(StreamResult::from_terminal(text, chunk)));
        }

        Ok(events)
    }

    fn incomplete(&mut self) -> GenerateError {
        tracing::warn!(
            received = self.text_buf.len(),
            "stream closed before final chunk"
        );
        GenerateError::IncompleteStream {
            partial: std::mem::take(&mut self.text_buf),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
