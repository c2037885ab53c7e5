use serde::{Deserialize, Serialize};

use super::message::{Message, PromptMessage};

/// A named, ordered list of messages
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    name: String,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            messages: Vec::new(),
        }
    }

    /// Get conversation ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get conversation name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Get the committed messages in append order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Allocate the id for the next message.
    ///
    /// Ids follow the wall clock but never repeat or go backwards within a
    /// conversation: two messages created in the same millisecond get
    /// consecutive ids.
    pub fn next_message_id(&self, now_ms: u64) -> u64 {
        match self.messages.last() {
            Some(last) => now_ms.max(last.id + 1),
            None => now_ms,
        }
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// History in the shape the remote generator consumes
    pub fn prompt_history(&self) -> Vec<PromptMessage> {
        self.messages.iter().map(PromptMessage::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_message_id_follows_clock() {
        let conv = Conversation::new("1".into(), "New Chat 1".into());
        assert_eq!(conv.next_message_id(1_000), 1_000);
    }

    #[test]
    fn test_next_message_id_never_collides_within_same_tick() {
        let mut conv = Conversation::new("1".into(), "New Chat 1".into());
        let first = conv.next_message_id(5_000);
        conv.push_message(Message::user(first, "a", None));
        let second = conv.next_message_id(5_000);
        conv.push_message(Message::assistant(second, "b"));
        let third = conv.next_message_id(4_000); // clock went backwards

        assert_eq!(first, 5_000);
        assert_eq!(second, 5_001);
        assert_eq!(third, 5_002);
    }

    #[test]
    fn test_prompt_history_preserves_order_and_images() {
        let mut conv = Conversation::new("1".into(), "Chat".into());
        conv.push_message(Message::user(1, "what is this?", Some("data:image/png;base64,AA".into())));
        conv.push_message(Message::assistant(2, "a pixel"));

        let history = conv.prompt_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "what is this?");
        assert_eq!(history[0].image_url.as_deref(), Some("data:image/png;base64,AA"));
        assert_eq!(history[1].content, "a pixel");
    }
}
