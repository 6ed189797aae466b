//! Bounded local transcript
//!
//! The in-memory list is authoritative; it is read from the store once at
//! construction and written through on every mutation.

use crate::domain::models::{Message, RawMessage, filter_conversational};
use crate::infrastructure::storage::KeyValueStore;
use crate::shared::constants::{MAX_CACHED_MESSAGES, keys};
use crate::shared::logging;

#[derive(Debug, Clone)]
pub struct MessageCache {
    store: KeyValueStore,
    messages: Vec<Message>,
}

impl MessageCache {
    pub fn new(store: KeyValueStore) -> Self {
        let messages = read_persisted(&store);
        Self { store, messages }
    }

    /// Cached transcript, oldest first
    pub fn load(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
        self.persist();
    }

    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.truncate();
        self.persist();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.persist();
    }

    /// Keep only the most recent entries
    fn truncate(&mut self) {
        if self.messages.len() > MAX_CACHED_MESSAGES {
            let dropped = self.messages.len() - MAX_CACHED_MESSAGES;
            self.messages.drain(..dropped);
            logging::log_cache_truncated(dropped, self.messages.len());
        }
    }

    fn persist(&self) {
        self.store.set(keys::MESSAGES, &self.messages);
    }
}

/// Read the persisted list, dropping anything that is not a user or
/// assistant turn and anything past the size bound.
fn read_persisted(store: &KeyValueStore) -> Vec<Message> {
    let Some(raw) = store.get::<Vec<RawMessage>>(keys::MESSAGES) else {
        return Vec::new();
    };

    let (mut messages, dropped) = filter_conversational(raw);
    if dropped > 0 {
        logging::log_cache_entries_filtered(dropped);
    }

    if messages.len() > MAX_CACHED_MESSAGES {
        let excess = messages.len() - MAX_CACHED_MESSAGES;
        messages.drain(..excess);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MessageRole;
    use crate::infrastructure::storage::{MemoryBackend, share};
    use serde_json::json;

    fn store() -> KeyValueStore {
        KeyValueStore::new(share(MemoryBackend::new()), "t_")
    }

    #[test]
    fn test_empty_store_loads_empty() {
        assert!(MessageCache::new(store()).load().is_empty());
    }

    #[test]
    fn test_append_25_keeps_most_recent_20() {
        let store = store();
        let mut cache = MessageCache::new(store.clone());

        for i in 0..25 {
            cache.append(Message::user(format!("message {}", i)));
        }

        let messages = cache.load();
        assert_eq!(messages.len(), 20);
        assert_eq!(messages.first().unwrap().content, "message 5");
        assert_eq!(messages.last().unwrap().content, "message 24");

        // The persisted copy is bounded too
        assert_eq!(MessageCache::new(store).len(), 20);
    }

    #[test]
    fn test_load_filters_system_entries_seeded_in_store() {
        let store = store();
        store.set(
            keys::MESSAGES,
            &json!([
                {"role": "user", "content": "hi", "timestamp": "2025-01-01T10:00:00Z"},
                {"role": "system", "content": "internal prompt", "timestamp": "2025-01-01T10:00:01Z"},
                {"role": "assistant", "content": "hello", "timestamp": "2025-01-01T10:00:02Z"}
            ]),
        );

        let messages = MessageCache::new(store).load();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(messages.iter().all(|m| m.content != "internal prompt"));
    }

    #[test]
    fn test_malformed_persisted_value_loads_empty() {
        let store = store();
        store.set(keys::MESSAGES, &json!({"not": "a list"}));

        assert!(MessageCache::new(store).is_empty());
    }

    #[test]
    fn test_replace_all_truncates_and_persists() {
        let store = store();
        let mut cache = MessageCache::new(store.clone());

        let history: Vec<Message> = (0..30).map(|i| Message::assistant(format!("m{}", i))).collect();
        cache.replace_all(history);

        assert_eq!(cache.len(), 20);
        assert_eq!(cache.messages()[0].content, "m10");
        assert_eq!(MessageCache::new(store).load(), cache.load());
    }

    #[test]
    fn test_clear_persists_empty_sequence() {
        let store = store();
        let mut cache = MessageCache::new(store.clone());
        cache.append(Message::user("hello"));
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(store.get::<Vec<serde_json::Value>>(keys::MESSAGES), Some(vec![]));
    }

    #[test]
    fn test_works_without_storage() {
        let mut cache = MessageCache::new(KeyValueStore::disabled("t_"));
        cache.append(Message::user("still visible"));

        assert_eq!(cache.len(), 1);
    }
}
