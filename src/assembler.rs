//! Builds the message payload sent to the model for each submission.
//!
//! A payload is always `[system, context..., user]`: one freshly generated system instruction
//! for the current ticket category, the trailing window of the session history, and the
//! just-submitted user turn, which carries the image when one is attached.

use crate::session::{DEFAULT_CONTEXT_TURNS, Session};
use crate::types::{Attachment, Category, ChatMessage, Role};

/// The system instruction for a ticket category.
///
/// Generated fresh for every request and never stored in the session.
pub fn system_instruction(category: Category) -> String {
    format!(
        "You are a Senior Level 3 Support Engineer.\n\
         CURRENT TICKET CATEGORY: {category}\n\
         Tone: Professional, concise, solution-oriented."
    )
}

/// Assembles outbound payloads from a session's trailing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAssembler {
    context_turns: usize,
}

impl RequestAssembler {
    /// Creates an assembler that replays the last `context_turns` turns.
    pub fn new(context_turns: usize) -> Self {
        Self { context_turns }
    }

    /// How many trailing turns are replayed.
    pub fn context_turns(&self) -> usize {
        self.context_turns
    }

    /// Builds the payload for `prompt`.
    ///
    /// The caller is expected to have appended the user turn for `prompt` to `session`
    /// already; when the context window does not end in a user turn (an empty session, or a
    /// window of zero turns) the prompt is appended here instead. With an attachment, the
    /// trailing user entry is replaced by a text part plus one image part. Stored system turns
    /// are never replayed. The session is not modified.
    pub fn assemble(
        &self,
        session: &Session,
        category: Category,
        prompt: &str,
        attachment: Option<&Attachment>,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(system_instruction(category))];
        messages.extend(
            session
                .recent_context(self.context_turns)
                .iter()
                .filter(|turn| turn.role != Role::System)
                .map(ChatMessage::from),
        );

        let ends_with_user = messages.len() > 1
            && messages
                .last()
                .is_some_and(|message| message.role == Role::User);
        if let Some(attachment) = attachment {
            if ends_with_user {
                messages.pop();
            }
            messages.push(ChatMessage::user_with_image(prompt, attachment));
        } else if !ends_with_user {
            messages.push(ChatMessage::user(prompt));
        }
        messages
    }
}

impl Default for RequestAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_TURNS)
    }
}
