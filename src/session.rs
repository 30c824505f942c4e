//! In-memory conversation history for one chat session.
//!
//! The history is append-only: turns are never edited or removed while the session lives.
//! Dropping the `Session` is the only way to discard it.

use crate::types::{Role, Turn};

/// Number of trailing turns replayed as model context by default.
pub const DEFAULT_CONTEXT_TURNS: usize = 4;

/// Ordered, append-only list of turns.
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Adds a turn to the end of the history.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first.
    ///
    /// Returns every stored turn when fewer than `n` exist.
    pub fn recent_context(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// All stored turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if no turn has been stored.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of stored turns with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TurnContent;

    fn session_with(n: usize) -> Session {
        let mut session = Session::new();
        for i in 0..n {
            if i % 2 == 0 {
                session.append(Turn::user(format!("question {i}")));
            } else {
                session.append(Turn::assistant(format!("answer {i}")));
            }
        }
        session
    }

    #[test]
    fn new_session_empty() {
        let session = Session::new();
        assert!(session.is_empty());
        assert!(session.recent_context(DEFAULT_CONTEXT_TURNS).is_empty());
        assert!(session.last().is_none());
    }

    #[test]
    fn append_keeps_order() {
        let session = session_with(3);
        let texts: Vec<String> = session
            .turns()
            .iter()
            .map(|turn| turn.content.as_text())
            .collect();
        assert_eq!(texts, vec!["question 0", "answer 1", "question 2"]);
        assert_eq!(session.count_role(Role::User), 2);
        assert_eq!(session.count_role(Role::Assistant), 1);
    }

    #[test]
    fn recent_context_is_bounded() {
        for stored in 0..10 {
            let session = session_with(stored);
            let window = session.recent_context(4);
            assert_eq!(window.len(), stored.min(4));
        }
    }

    #[test]
    fn recent_context_returns_tail_in_order() {
        let session = session_with(7);
        let window = session.recent_context(4);
        assert_eq!(
            window[0].content,
            TurnContent::Text("answer 3".to_string())
        );
        assert_eq!(
            window[3].content,
            TurnContent::Text("question 6".to_string())
        );
    }

    #[test]
    fn recent_context_zero() {
        let session = session_with(3);
        assert!(session.recent_context(0).is_empty());
    }
}
