//! SSE streaming response parser for `/generate_stream`.
//!
//! Reads the response as a byte stream, splits on SSE boundaries
//! (`data:…\n\n`), and parses each event as a [`StreamResponse`]. Bytes are
//! buffered until a whole event is available, so multi-byte characters split
//! across network chunks decode correctly.

use futures::stream::{self, Stream, StreamExt};

use super::errors::{InferenceError, ServerErrorKind};
use super::types::{ErrorResponse, StreamResponse};

// ─── SSE line parser ─────────────────────────────────────────────────────────

/// Parse a streaming HTTP response into [`StreamResponse`] events.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<StreamResponse, InferenceError>> + Send + 'static {
    decode_sse_events(Box::pin(response.bytes_stream()))
}

/// Decode SSE events from any byte-chunk stream.
///
/// A read error is yielded once and ends the stream.
pub fn decode_sse_events<S, B, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<StreamResponse, InferenceError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    stream::unfold(
        (byte_stream, Vec::<u8>::new(), false),
        |(mut byte_stream, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }

                if let Some(event_end) = find_event_end(&buffer) {
                    let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                    let event = String::from_utf8_lossy(&event[..event_end]).into_owned();

                    match process_event(&event) {
                        Ok(Some(parsed)) => return Some((Ok(parsed), (byte_stream, buffer, done))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (byte_stream, buffer, done))),
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.extend(bytes.as_ref().iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        done = true;
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, buffer, done),
                        ));
                    }
                    None => {
                        // Flush a final event that lacked the blank-line terminator.
                        done = true;
                        let rest = String::from_utf8_lossy(&buffer).into_owned();
                        buffer.clear();
                        if rest.trim().is_empty() {
                            return None;
                        }
                        match process_event(rest.trim()) {
                            Ok(Some(parsed)) => {
                                return Some((Ok(parsed), (byte_stream, buffer, done)))
                            }
                            Ok(None) => return None,
                            Err(e) => return Some((Err(e), (byte_stream, buffer, done))),
                        }
                    }
                }
            }
        },
    )
}

/// Index of the `\n\n` that ends the first complete event.
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Process a single SSE event (may contain multiple `data:` lines).
///
/// Returns `Ok(None)` for comments and keep-alives.
fn process_event(event: &str) -> Result<Option<StreamResponse>, InferenceError> {
    let mut data_content = String::new();

    for line in event.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            data_content.push_str(data.strip_prefix(' ').unwrap_or(data));
        }
        // Ignore non-data lines (comments, event types, ids)
    }

    let data_content = data_content.trim();
    if data_content.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(data_content).map_err(|e| InferenceError::StreamError {
            reason: format!("failed to parse SSE event: {e} (data: {data_content})"),
        })?;

    if value.get("error").is_some() {
        let error: ErrorResponse =
            serde_json::from_value(value).map_err(|e| InferenceError::StreamError {
                reason: format!("malformed error event: {e}"),
            })?;
        return Err(InferenceError::ServerError {
            status: None,
            kind: ServerErrorKind::classify(error.error_type.as_deref(), None),
            message: error.error,
        });
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| InferenceError::StreamError {
            reason: format!("unexpected SSE event shape: {e} (data: {data_content})"),
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
