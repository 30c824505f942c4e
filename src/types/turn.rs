use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Attachment;

/// Role type for a conversational turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User role.
    User,

    /// Assistant role.
    Assistant,

    /// System role.
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// The `url` payload of an image part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    /// A `data:` URL carrying the base64-encoded image.
    pub url: String,
}

/// One part of a structured message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text part.
    Text {
        /// The text.
        text: String,
    },

    /// An inline image part.
    ImageUrl {
        /// The image location.
        image_url: ImageUrl,
    },
}

impl ContentPart {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Creates an image part from an attachment, keeping its media type.
    pub fn image(attachment: &Attachment) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: attachment.to_data_url(),
            },
        }
    }

    /// Returns true if this is an image part.
    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. })
    }
}

/// The content of a turn, which can be either a string or an array of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TurnContent {
    /// A simple string content.
    Text(String),

    /// An array of content parts.
    Parts(Vec<ContentPart>),
}

impl TurnContent {
    /// Returns the text of this content, joining text parts and skipping images.
    pub fn as_text(&self) -> String {
        match self {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Returns the number of image parts.
    pub fn image_count(&self) -> usize {
        match self {
            TurnContent::Text(_) => 0,
            TurnContent::Parts(parts) => parts.iter().filter(|p| p.is_image()).count(),
        }
    }
}

impl<T: AsRef<str>> From<T> for TurnContent {
    fn from(content: T) -> Self {
        TurnContent::Text(content.as_ref().to_string())
    }
}

/// One message exchanged in the conversation.
///
/// Turns are immutable once stored in a [`crate::Session`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    /// Who produced the turn.
    pub role: Role,

    /// What was said.
    pub content: TurnContent,

    /// When the turn was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl Turn {
    /// Create a new turn stamped with the current time.
    pub fn new(role: Role, content: impl Into<TurnContent>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }
}

/// A message entry in an outbound chat-completion payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// The role of the message.
    pub role: Role,

    /// The content of the message.
    pub content: TurnContent,
}

impl ChatMessage {
    /// Create a new message.
    pub fn new(role: Role, content: impl Into<TurnContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a user message carrying text and one inline image.
    pub fn user_with_image(text: impl Into<String>, attachment: &Attachment) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Parts(vec![
                ContentPart::text(text),
                ContentPart::image(attachment),
            ]),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}
