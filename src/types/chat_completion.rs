use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Model};

/// Parameters for a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionParams {
    /// The model that will complete the conversation.
    pub model: Model,

    /// The ordered message payload, system instruction first.
    pub messages: Vec<ChatMessage>,

    /// Whether to stream the response.
    pub stream: bool,
}

impl ChatCompletionParams {
    /// Create streaming parameters for the given model and payload.
    pub fn new_streaming(model: Model, messages: Vec<ChatMessage>) -> Self {
        Self {
            model,
            messages,
            stream: true,
        }
    }
}

/// The incremental part of a streamed choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    /// Present on the first chunk of some providers. Kept as text since providers send
    /// roles (`tool`, `developer`) that never appear in a request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Newly generated assistant text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One streamed choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: usize,

    /// The delta carried by this chunk.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Why generation stopped, on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// An error object embedded in the event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamErrorObject {
    /// Provider error code, numeric or string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<serde_json::Value>,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// One chunk of a streamed chat completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    /// Completion identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Model that produced the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Streamed choices; usually exactly one.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Mid-stream failure reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StreamErrorObject>,
}

impl ChatCompletionChunk {
    /// Text carried by the first choice, if it is non-empty.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// Finish reason of the first choice, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn params_serialize() {
        let params = ChatCompletionParams::new_streaming(
            Model::new("m1"),
            vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        );
        assert_eq!(
            to_value(&params).unwrap(),
            json!({
                "model": "m1",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn chunk_text() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"gen-1","model":"m1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.text(), Some("Hel"));
        assert_eq!(chunk.finish_reason(), None);
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
    }

    #[test]
    fn chunk_with_unlisted_role() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"role":"tool","content":"x"}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.text(), Some("x"));
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("tool"));
    }

    #[test]
    fn chunk_without_content() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(chunk.text(), None);
        assert_eq!(chunk.finish_reason(), Some("stop"));

        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap();
        assert_eq!(chunk.text(), None);

        let chunk: ChatCompletionChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(chunk.text(), None);
    }

    #[test]
    fn chunk_with_error() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"error":{"code":502,"message":"upstream overloaded"}}"#,
        )
        .unwrap();
        let error = chunk.error.unwrap();
        assert_eq!(error.message, "upstream overloaded");
        assert_eq!(error.code, Some(json!(502)));
    }
}
