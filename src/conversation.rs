//! Conversation-state cache: an LRU store keyed by conversation id, evicted
//! by least-recent activity once over capacity (default 1000, §5).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

struct Entry {
    value: serde_json::Value,
    last_activity: DateTime<Utc>,
}

/// Thread-safe, capacity-bounded conversation store.
///
/// Every read refreshes `last_activity`; insertion past capacity evicts the
/// single least-recently-active entry, never more.
pub struct ConversationCache {
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ConversationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, conversation_id: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(conversation_id)?;
        entry.last_activity = Utc::now();
        Some(entry.value.clone())
    }

    pub fn put(&self, conversation_id: impl Into<String>, value: serde_json::Value) {
        let mut entries = self.entries.lock().unwrap();
        let conversation_id = conversation_id.into();

        if !entries.contains_key(&conversation_id) && entries.len() >= self.capacity {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_activity)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            conversation_id,
            Entry {
                value,
                last_activity: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
