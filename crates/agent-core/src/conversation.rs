//! Conversation state for a single agent run.

use crate::types::{Content, ContentBlock, Message, Role};

/// Messages exchanged during one run plus the system prompt.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    system: Option<String>,
}

impl Conversation {
    /// Create a conversation with a system prompt.
    #[must_use]
    pub fn with_system(system: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            system: Some(system.into()),
        }
    }

    /// Get the system prompt.
    #[must_use]
    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// Get all messages.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Add a user message.
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            role: Role::User,
            content: Content::Text(text.into()),
        });
    }

    /// Add an assistant message with content blocks (for tool use).
    pub fn add_assistant_blocks(&mut self, blocks: Vec<ContentBlock>) {
        self.messages.push(Message {
            role: Role::Assistant,
            content: Content::Blocks(blocks),
        });
    }

    /// Add the results of every tool call from the previous assistant turn.
    ///
    /// All results share one user message; the Messages API rejects a
    /// tool-use turn whose results are split across several messages.
    pub fn add_tool_results(&mut self, results: Vec<ContentBlock>) {
        if results.is_empty() {
            return;
        }

        self.messages.push(Message {
            role: Role::User,
            content: Content::Blocks(results),
        });
    }

    /// Check if the conversation has any messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_tracks_messages() {
        let mut conv = Conversation::with_system("blog agent");

        conv.add_user_message("Rust");
        conv.add_assistant_blocks(vec![ContentBlock::Text {
            text: "了解".to_string(),
        }]);

        assert_eq!(conv.system(), Some("blog agent"));
        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn tool_results_share_one_message() {
        let mut conv = Conversation::default();
        conv.add_tool_results(vec![
            ContentBlock::ToolResult {
                tool_use_id: "a".to_string(),
                content: "one".to_string(),
                is_error: None,
            },
            ContentBlock::ToolResult {
                tool_use_id: "b".to_string(),
                content: "two".to_string(),
                is_error: Some(true),
            },
        ]);

        assert_eq!(conv.messages().len(), 1);
        match &conv.messages()[0].content {
            Content::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            Content::Text(_) => panic!("expected blocks"),
        }
    }

    #[test]
    fn empty_tool_results_are_skipped() {
        let mut conv = Conversation::default();
        conv.add_tool_results(Vec::new());
        assert!(conv.is_empty());
    }
}
