//! Append-only conversation log.

use crate::llm::{ChatMessage, Role};

/// Ordered messages of one session. Each turn produces a new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// A conversation whose only message is the user's task.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(task)],
        }
    }

    #[must_use]
    pub fn append(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of tool-result messages.
    pub fn tool_messages(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::Tool).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_produces_a_longer_log() {
        let first = Conversation::new("What time is it?");
        let second = first.clone().append(ChatMessage::assistant("Noon."));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(second.messages()[0], first.messages()[0]);
        assert_eq!(second.last().unwrap().role, Role::Assistant);
    }
}
