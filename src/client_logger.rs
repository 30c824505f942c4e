//! Logging hook for chat-completion traffic.
//!
//! [`ClientLogger`] lets callers capture every payload the [`crate::OpenRouter`] client
//! sends and every chunk it receives, for audit trails or debugging a misbehaving model.

use crate::types::{ChatCompletionChunk, ChatCompletionParams};

/// A trait for logging client operations.
///
/// # Example
///
/// ```rust,ignore
/// use supportintel::{ChatCompletionChunk, ChatCompletionParams, ClientLogger};
///
/// struct StderrLogger;
///
/// impl ClientLogger for StderrLogger {
///     fn log_request(&self, params: &ChatCompletionParams) {
///         eprintln!("-> {} ({} messages)", params.model, params.messages.len());
///     }
///
///     fn log_stream_chunk(&self, chunk: &ChatCompletionChunk) {
///         eprintln!("<- {:?}", chunk.text());
///     }
///
///     fn log_stream_text(&self, text: &str) {
///         eprintln!("== {text}");
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outbound request payload, before it is sent.
    fn log_request(&self, params: &ChatCompletionParams);

    /// Log an individual parsed chunk, including chunks that carry no text.
    fn log_stream_chunk(&self, chunk: &ChatCompletionChunk);

    /// Log the text accumulated from a stream that finished cleanly.
    ///
    /// Called once per stream, with an empty string when the model produced nothing.
    fn log_stream_text(&self, text: &str);
}

/// A [`ClientLogger`] that forwards traffic to `tracing` at debug/trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingClientLogger;

impl ClientLogger for TracingClientLogger {
    fn log_request(&self, params: &ChatCompletionParams) {
        tracing::debug!(
            model = %params.model,
            messages = params.messages.len(),
            "chat completion request"
        );
    }

    fn log_stream_chunk(&self, chunk: &ChatCompletionChunk) {
        tracing::trace!(
            text = chunk.text().unwrap_or(""),
            finish_reason = chunk.finish_reason().unwrap_or(""),
            "stream chunk"
        );
    }

    fn log_stream_text(&self, text: &str) {
        tracing::debug!(chars = text.chars().count(), "stream complete");
    }
}
