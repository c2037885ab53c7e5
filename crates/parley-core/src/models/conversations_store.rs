use tracing::{debug, warn};

use super::conversation::Conversation;
use super::message::{Message, Role};

/// Milliseconds since the Unix epoch, used to derive ids
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// In-memory collection of conversations plus the active selection.
///
/// Conversations are kept in creation order, which is also the order they
/// are persisted in. The active conversation is held by id only and is
/// cleared whenever that conversation is deleted, so it never dangles.
///
/// Every mutation bumps `revision`; the persistence coordinator uses it to
/// discard snapshots that were overtaken by a newer save.
#[derive(Debug, Default)]
pub struct ConversationsStore {
    conversations: Vec<Conversation>,
    active_conversation_id: Option<String>,
    revision: u64,
}

impl ConversationsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted conversations. Nothing is active after a load.
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations,
            active_conversation_id: None,
            revision: 0,
        }
    }

    /// Create a conversation named "New Chat N" and make it active
    pub fn create_conversation(&mut self) -> String {
        self.create_conversation_at(now_millis())
    }

    pub fn create_conversation_at(&mut self, now_ms: u64) -> String {
        let mut candidate = now_ms;
        while self.contains(&candidate.to_string()) {
            candidate += 1;
        }
        let id = candidate.to_string();
        let name = format!("New Chat {}", self.conversations.len() + 1);

        debug!(conv_id = %id, name = %name, "Creating conversation");
        self.conversations.push(Conversation::new(id.clone(), name));
        self.active_conversation_id = Some(id.clone());
        self.bump();
        id
    }

    /// Rename a conversation. Blank names and unknown ids are ignored.
    pub fn rename_conversation(&mut self, id: &str, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            debug!(conv_id = %id, "Ignoring rename to blank name");
            return false;
        }

        let Some(conv) = self.get_conversation_mut(id) else {
            debug!(conv_id = %id, "Ignoring rename of unknown conversation");
            return false;
        };
        conv.set_name(trimmed.to_string());
        self.bump();
        true
    }

    /// Delete a conversation by ID
    pub fn delete_conversation(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id() != id);
        if self.conversations.len() == before {
            debug!(conv_id = %id, "Ignoring delete of unknown conversation");
            return false;
        }

        if self.active_conversation_id.as_deref() == Some(id) {
            self.active_conversation_id = None;
        }
        self.bump();
        true
    }

    /// Append an already-built message.
    ///
    /// Rejected when the conversation is gone or when the id would break the
    /// strictly increasing order of the thread.
    pub fn append_message(&mut self, id: &str, message: Message) -> bool {
        let Some(conv) = self.get_conversation_mut(id) else {
            warn!(conv_id = %id, "Dropping message for missing conversation");
            return false;
        };
        if let Some(last) = conv.last_message()
            && message.id <= last.id
        {
            warn!(conv_id = %id, message_id = message.id, last_id = last.id, "Dropping message with non-increasing id");
            return false;
        }
        conv.push_message(message);
        self.bump();
        true
    }

    /// Build a message with the next id for the conversation and append it
    pub fn push_new_message(
        &mut self,
        id: &str,
        role: Role,
        content: String,
        image_url: Option<String>,
    ) -> Option<Message> {
        let conv = self.get_conversation(id)?;
        let message = Message {
            id: conv.next_message_id(now_millis()),
            role,
            content,
            image_url,
        };
        self.append_message(id, message.clone()).then_some(message)
    }

    /// Set the active conversation
    pub fn set_active(&mut self, id: &str) -> bool {
        if self.contains(id) {
            self.active_conversation_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Get the active conversation ID
    pub fn active_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_id().and_then(|id| self.get_conversation(id))
    }

    /// Get a conversation by ID (immutable)
    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id() == id)
    }

    fn get_conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_conversation(id).is_some()
    }

    /// Conversations in creation order
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Conversations newest first, as the sidebar lists them
    pub fn list_for_sidebar(&self) -> Vec<&Conversation> {
        self.conversations.iter().rev().collect()
    }

    /// Get count of conversations
    pub fn count(&self) -> usize {
        self.conversations.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clone of the committed state, ready to serialize
    pub fn snapshot(&self) -> (u64, Vec<Conversation>) {
        (self.revision, self.conversations.clone())
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_names_and_activates() {
        let mut store = ConversationsStore::new();
        let first = store.create_conversation_at(100);
        let second = store.create_conversation_at(200);

        assert_eq!(store.get_conversation(&first).unwrap().name(), "New Chat 1");
        assert_eq!(store.get_conversation(&second).unwrap().name(), "New Chat 2");
        assert_eq!(store.active_id(), Some(second.as_str()));
    }

    #[test]
    fn test_create_in_same_tick_gets_distinct_ids() {
        let mut store = ConversationsStore::new();
        let a = store.create_conversation_at(42);
        let b = store.create_conversation_at(42);

        assert_eq!(a, "42");
        assert_eq!(b, "43");
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_default_name_uses_current_count_after_delete() {
        let mut store = ConversationsStore::new();
        let a = store.create_conversation_at(1);
        store.create_conversation_at(2);
        store.delete_conversation(&a);
        let c = store.create_conversation_at(3);

        assert_eq!(store.get_conversation(&c).unwrap().name(), "New Chat 2");
    }

    #[test]
    fn test_rename_trims_and_rejects_blank() {
        let mut store = ConversationsStore::new();
        let id = store.create_conversation_at(1);

        assert!(!store.rename_conversation(&id, "   "));
        assert_eq!(store.get_conversation(&id).unwrap().name(), "New Chat 1");

        assert!(store.rename_conversation(&id, "  Project Ideas "));
        assert_eq!(store.get_conversation(&id).unwrap().name(), "Project Ideas");

        assert!(!store.rename_conversation("missing", "x"));
    }

    #[test]
    fn test_delete_active_clears_selection() {
        let mut store = ConversationsStore::new();
        let id = store.create_conversation_at(1);
        assert!(store.delete_conversation(&id));
        assert!(store.active_id().is_none());
        assert!(store.active_conversation().is_none());
        assert!(!store.delete_conversation(&id));
    }

    #[test]
    fn test_active_never_dangles_over_create_delete_sequences() {
        let mut store = ConversationsStore::new();
        let mut ids = Vec::new();
        // Deterministic pseudo-random walk over create/delete operations
        let mut seed: u64 = 0x2545_f491;
        for step in 0..200u64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            if seed % 3 == 0 || ids.is_empty() {
                ids.push(store.create_conversation_at(step));
            } else {
                let idx = (seed as usize / 3) % ids.len();
                let id: String = ids.remove(idx);
                store.delete_conversation(&id);
            }
            if seed % 5 == 0
                && let Some(id) = ids.first()
            {
                store.set_active(id);
            }

            if let Some(active) = store.active_id() {
                assert!(store.contains(active), "active id {active} dangles");
            }
        }
    }

    #[test]
    fn test_append_message_rules() {
        let mut store = ConversationsStore::new();
        let id = store.create_conversation_at(1);

        assert!(store.append_message(&id, Message::user(10, "a", None)));
        assert!(!store.append_message(&id, Message::assistant(10, "dup")));
        assert!(!store.append_message("missing", Message::user(11, "b", None)));
        assert_eq!(store.get_conversation(&id).unwrap().message_count(), 1);
    }

    #[test]
    fn test_push_new_message_allocates_increasing_ids() {
        let mut store = ConversationsStore::new();
        let id = store.create_conversation_at(1);

        let a = store
            .push_new_message(&id, Role::User, "q".into(), None)
            .unwrap();
        let b = store
            .push_new_message(&id, Role::Assistant, "r".into(), None)
            .unwrap();

        assert!(b.id > a.id);
        assert!(store.push_new_message("missing", Role::User, "x".into(), None).is_none());
    }

    #[test]
    fn test_revision_only_moves_on_change() {
        let mut store = ConversationsStore::new();
        let id = store.create_conversation_at(1);
        let rev = store.revision();

        store.rename_conversation(&id, "");
        store.delete_conversation("missing");
        store.set_active(&id);
        assert_eq!(store.revision(), rev);

        store.rename_conversation(&id, "Renamed");
        assert_eq!(store.revision(), rev + 1);
    }

    #[test]
    fn test_sidebar_lists_newest_first() {
        let mut store = ConversationsStore::new();
        let a = store.create_conversation_at(1);
        let b = store.create_conversation_at(2);

        let listed: Vec<&str> = store.list_for_sidebar().iter().map(|c| c.id()).collect();
        assert_eq!(listed, vec![b.as_str(), a.as_str()]);
    }
}
