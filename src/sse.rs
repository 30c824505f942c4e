//! Server-Sent Events (SSE) processing for streamed chat completions.
//!
//! This module converts the raw byte stream of an HTTP response into parsed
//! [`ChatCompletionChunk`]s. Events are separated by a blank line; only `data:` fields are
//! meaningful, comment lines (`: OPENROUTER PROCESSING`) are keep-alives, and `data: [DONE]`
//! terminates the stream.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Sentinel payload that ends a chat-completion stream.
const DONE_MARKER: &str = "[DONE]";

/// One decoded SSE event.
#[derive(Debug)]
enum SseEvent {
    Chunk(ChatCompletionChunk),
    Done,
    Skip,
}

/// Process a stream of bytes into a stream of chat-completion chunks.
///
/// Stops after `[DONE]`. Transport errors, malformed JSON, and error objects embedded in a
/// chunk are yielded as `Err` items.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    // Raw bytes are buffered so multi-byte characters split across reads decode cleanly.
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false, false),
        move |(mut stream, mut buffer, mut done, mut eof)| async move {
            loop {
                if done {
                    return None;
                }

                if let Some((event, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    match event {
                        Ok(SseEvent::Chunk(chunk)) => {
                            return Some((Ok(chunk), (stream, buffer, done, eof)));
                        }
                        Ok(SseEvent::Done) => {
                            done = true;
                            continue;
                        }
                        Ok(SseEvent::Skip) => continue,
                        Err(e) => {
                            STREAM_ERRORS.click();
                            return Some((Err(e), (stream, buffer, done, eof)));
                        }
                    }
                }

                if eof {
                    return None;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        done = true;
                        return Some((Err(e), (stream, buffer, done, eof)));
                    }
                    None => {
                        // A final event may lack its trailing blank line.
                        eof = true;
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        buffer.extend_from_slice(b"\n\n");
                    }
                }
            }
        },
    )
}

/// Extract a complete SSE event from the front of the buffer.
///
/// Returns `None` until a blank-line delimiter has been received.
fn extract_event(buffer: &[u8]) -> Option<(Result<SseEvent>, Vec<u8>)> {
    let (end, delimiter_len) = find_delimiter(buffer)?;
    let rest = buffer[end + delimiter_len..].to_vec();
    let event_text = match std::str::from_utf8(&buffer[..end]) {
        Ok(text) => text,
        Err(e) => {
            return Some((
                Err(Error::encoding(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                )),
                rest,
            ));
        }
    };
    Some((parse_event(event_text), rest))
}

/// Position and length of the first blank-line delimiter, accepting `\n\n` and `\r\n\r\n`.
fn find_delimiter(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Parse the lines of one event into a chunk.
fn parse_event(event_text: &str) -> Result<SseEvent> {
    let mut data: Vec<&str> = Vec::new();
    for line in event_text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
        // `event:`, `id:` and `retry:` fields carry nothing for chat completions.
    }

    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    let payload = data.join("\n");
    let payload = payload.trim();
    if payload == DONE_MARKER {
        return Ok(SseEvent::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(payload).map_err(|e| {
        Error::serialization(
            format!("Failed to parse chunk JSON: {e}"),
            Some(Box::new(e)),
        )
    })?;
    if let Some(error) = &chunk.error {
        let code = error
            .code
            .as_ref()
            .map(|code| match code {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "stream_error".to_string());
        return Err(Error::streaming(
            format!("{code}: {}", error.message),
            None,
        ));
    }
    Ok(SseEvent::Chunk(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn chunks_of(parts: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect_texts(parts: &[&'static [u8]]) -> Vec<Result<Option<String>>> {
        process_sse(chunks_of(parts))
            .map(|item| item.map(|chunk| chunk.text().map(String::from)))
            .collect()
            .await
    }

    #[tokio::test]
    async fn parse_single_chunk() {
        let items = collect_texts(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn unlisted_delta_role_keeps_streaming() {
        let items = collect_texts(&[
            b"data: {\"choices\":[{\"delta\":{\"role\":\"tool\",\"content\":\"x\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"y\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().as_deref(), Some("x"));
        assert_eq!(items[1].as_ref().unwrap().as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn stops_at_done() {
        let items = collect_texts(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            b"data: [DONE]\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn handle_split_event() {
        let items = collect_texts(&[
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"world\"}}]}\n",
            b"\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn handle_split_utf8() {
        // "é" is 0xC3 0xA9; split it across two reads.
        let items = collect_texts(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3",
            b"\xA9\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items[0].as_ref().unwrap().as_deref(), Some("café"));
    }

    #[tokio::test]
    async fn comments_and_crlf_are_accepted() {
        let items = collect_texts(&[
            b": OPENROUTER PROCESSING\n\n",
            b"event: message\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n\r\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn trailing_event_without_delimiter() {
        let items =
            collect_texts(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().as_deref(), Some("tail"));
    }

    #[tokio::test]
    async fn handle_malformed_event() {
        let items = collect_texts(&[b"data: {not json\n\n"]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Serialization { .. })));
    }

    #[tokio::test]
    async fn embedded_error_object() {
        let items = collect_texts(&[
            b"data: {\"error\":{\"code\":429,\"message\":\"Rate limit exceeded\"}}\n\n",
        ])
        .await;
        let err = items[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("429: Rate limit exceeded"));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let parts: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            )),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
            )),
        ];
        let items: Vec<_> = process_sse(stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Streaming { .. })));
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        let items = collect_texts(&[b"\n"]).await;
        assert!(items.is_empty());
    }
}
