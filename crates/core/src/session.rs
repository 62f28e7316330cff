//! Conversation session state.
//!
//! A session owns two sequences with a shared reset lifecycle: the
//! message history replayed to the model, and the display transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{ConversationTurn, Message, Role};

/// Session used when a caller does not name one.
pub const DEFAULT_SESSION: &str = "default";

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The conversation state of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    system_prompt: String,
    messages: Vec<Message>,
    transcript: Vec<ConversationTurn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a session holding only the system prompt.
    pub fn new(id: SessionId, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let now = Utc::now();
        Self {
            id,
            messages: vec![Message::system(&system_prompt)],
            system_prompt,
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The full message history, starting with the system prompt.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The display transcript.
    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    /// Append the messages of one completed exchange and its display turn.
    ///
    /// This is the only way history grows, so a failed exchange leaves
    /// no trace.
    pub fn commit(&mut self, messages: Vec<Message>, turn: ConversationTurn) {
        self.messages.extend(messages);
        self.transcript.push(turn);
        self.updated_at = Utc::now();
    }

    /// Clear history back to the system prompt and empty the transcript.
    pub fn reset(&mut self) {
        self.messages = vec![Message::system(&self.system_prompt)];
        self.transcript.clear();
        self.updated_at = Utc::now();
    }

    /// Whether the session has nothing but its system prompt.
    pub fn is_fresh(&self) -> bool {
        self.transcript.is_empty()
            && self.messages.len() == 1
            && self.messages[0].role == Role::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_holds_only_system_prompt() {
        let session = Session::new(SessionId::default(), "You are helpful");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert_eq!(session.messages()[0].content, "You are helpful");
        assert!(session.transcript().is_empty());
        assert!(session.is_fresh());
    }

    #[test]
    fn commit_appends_messages_and_turn() {
        let mut session = Session::new(SessionId::from("s1"), "sys");
        session.commit(
            vec![Message::user("hi"), Message::assistant("hello")],
            ConversationTurn::new("hi", "hello"),
        );
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.transcript().len(), 1);
        assert!(!session.is_fresh());
    }

    #[test]
    fn reset_restores_system_prompt_only() {
        let mut session = Session::new(SessionId::from("s1"), "sys");
        for i in 0..3 {
            session.commit(
                vec![Message::user(format!("q{i}")), Message::assistant(format!("a{i}"))],
                ConversationTurn::new(format!("q{i}"), format!("a{i}")),
            );
        }
        session.reset();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "sys");
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn default_session_id() {
        assert_eq!(SessionId::default().to_string(), DEFAULT_SESSION);
        assert_eq!(SessionId::from("line-2").to_string(), "line-2");
    }
}
