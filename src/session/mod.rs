//! Chat session state and request preparation
//!
//! A session owns the full untrimmed history (the unit of persistence) and
//! prepares each model request as a fresh computation over a snapshot of
//! it. The backend wrapper serializes the prepared prompt, streams the
//! reply, and appends it back via [`ChatSession::push_assistant`]; the next
//! preparation sees the complete history again.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::{ContextManager, ContextWindowUsage, Message, Role};
use crate::metrics::METRICS;

/// A trimmed request ready for the backend wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedRequest {
    /// The trimmed ordered subsequence of the history
    pub messages: Vec<Message>,
    /// The same messages rendered as a plain-text prompt prefix
    pub prompt: String,
}

/// A single conversation with its context manager
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    messages: Vec<Message>,
    manager: ContextManager,
}

impl ChatSession {
    pub fn new(manager: ContextManager) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            manager,
        }
    }

    /// Create a session seeded with a system prompt
    pub fn with_system_prompt(manager: ContextManager, system_prompt: impl Into<String>) -> Self {
        let mut session = Self::new(manager);
        session.messages.push(Message::system(system_prompt));
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The full untrimmed history
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    /// Mutable access to the manager, e.g. for settings changes at runtime
    pub fn manager_mut(&mut self) -> &mut ContextManager {
        &mut self.manager
    }

    /// Append a message to the untrimmed history.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Prepare the next model request from the full history.
    ///
    /// The history itself is never modified; persistence always sees the
    /// untrimmed sequence.
    pub fn prepare_request(&self) -> PreparedRequest {
        let trimmed = self.manager.truncate_messages(&self.messages);

        let dropped = self.messages.len() - trimmed.len();
        if dropped > 0 {
            debug!(
                "Session {}: dropped {} of {} messages to fit the context window",
                self.id,
                dropped,
                self.messages.len()
            );
            METRICS.record_truncation(dropped);
        }
        METRICS.record_usage(self.manager.context_window_usage(&trimmed).usage_percent);

        PreparedRequest {
            prompt: render_prompt(&trimmed),
            messages: trimmed,
        }
    }

    /// Whether the history has grown enough to be worth summarizing
    pub fn should_summarize(&self) -> bool {
        self.manager.should_summarize(&self.messages)
    }

    /// Extractive digest of the conversation so far
    pub fn summarize(&self) -> String {
        METRICS.record_summarization();
        self.manager.summarize_context(&self.messages)
    }

    /// Window usage over the untrimmed history
    pub fn usage(&self) -> ContextWindowUsage {
        self.manager.context_window_usage(&self.messages)
    }
}

/// Serialize trimmed messages into the plain-text prompt prefix the local
/// backend expects.
pub fn render_prompt(messages: &[Message]) -> String {
    let mut blocks: Vec<String> = Vec::with_capacity(messages.len() + 1);
    for message in messages {
        let tag = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        blocks.push(format!("{}: {}", tag, message.content));
    }
    blocks.push("Assistant:".to_string());
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip() {
        let mut session =
            ChatSession::with_system_prompt(ContextManager::default(), "You are helpful");
        session.push_user("hi");
        session.push_assistant("hello, what can I do for you?");
        session.push_user("nothing yet");

        assert_eq!(session.history().len(), 4);

        let prepared = session.prepare_request();
        assert_eq!(prepared.messages.len(), 4);
        assert!(prepared.prompt.starts_with("System: You are helpful"));
        assert!(prepared.prompt.ends_with("Assistant:"));
        // Preparing a request leaves the untrimmed history alone.
        assert_eq!(session.history().len(), 4);
    }

    #[test]
    fn test_prepare_drops_old_history_but_keeps_it_persisted() {
        let mut session = ChatSession::new(ContextManager::new(1024, 256));
        for i in 0..50 {
            session.push_user(format!("message number {} {}", i, "x ".repeat(100)));
        }

        let prepared = session.prepare_request();
        assert!(prepared.messages.len() < session.history().len());
        assert_eq!(session.history().len(), 50);
        assert_eq!(
            prepared.messages.last().unwrap().content,
            session.history().last().unwrap().content
        );
    }

    #[test]
    fn test_render_prompt_tags_roles() {
        let prompt = render_prompt(&[Message::user("one"), Message::assistant("two")]);
        assert_eq!(prompt, "User: one\n\nAssistant: two\n\nAssistant:");
    }

    #[test]
    fn test_empty_session_prepares_empty_prompt() {
        let session = ChatSession::new(ContextManager::default());
        let prepared = session.prepare_request();
        assert!(prepared.messages.is_empty());
        assert_eq!(prepared.prompt, "Assistant:");
    }
}
