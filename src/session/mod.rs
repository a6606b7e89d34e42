//! Session module - in-memory conversation storage
//!
//! The [`ConversationStore`] maps conversation ids to their histories. New
//! conversations come into existence only through
//! [`ConversationStore::get_or_create`]; histories change only through
//! [`ConversationStore::append`].
//!
//! # Concurrency
//!
//! The id map is behind an `RwLock` that is held only for lookups and
//! inserts. Each conversation has its own history mutex plus a run lock that
//! the orchestrator holds for a whole run, so two runs on the same
//! conversation are serialized while different conversations proceed in
//! parallel.
//!
//! # Example
//!
//! ```
//! use kubepilot::session::{ConversationStore, Turn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = ConversationStore::new();
//!     let (id, history) = store.get_or_create(None).await;
//!     assert!(history.is_empty());
//!
//!     store.append(&id, Turn::user("hello")).await.unwrap();
//!     let (same, history) = store.get_or_create(Some(&id)).await;
//!     assert_eq!(same, id);
//!     assert_eq!(history.len(), 1);
//! }
//! ```

pub mod types;

pub use types::{Conversation, Part, Role, Turn};

use crate::error::{PilotError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

struct Entry {
    conversation: Mutex<Conversation>,
    run_lock: Arc<Mutex<()>>,
}

/// Keyed in-memory store of conversation histories.
#[derive(Default)]
pub struct ConversationStore {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a conversation, creating it if `id` is absent or unknown.
    ///
    /// Returns the id actually in use and a snapshot of its history. An
    /// unknown id is never adopted: a fresh one is minted instead, so an id
    /// only ever refers to a conversation this store created.
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, Vec<Turn>) {
        if let Some(entry) = self.entry_opt(id).await {
            let conversation = entry.conversation.lock().await;
            return (conversation.id.clone(), conversation.turns.clone());
        }

        let new_id = uuid::Uuid::new_v4().to_string();
        let entry = Arc::new(Entry {
            conversation: Mutex::new(Conversation::new(new_id.clone())),
            run_lock: Arc::new(Mutex::new(())),
        });
        self.entries.write().await.insert(new_id.clone(), entry);
        tracing::debug!(conversation_id = %new_id, "Created conversation");
        (new_id, Vec::new())
    }

    /// Append a turn to an existing conversation.
    pub async fn append(&self, id: &str, turn: Turn) -> Result<()> {
        let entry = self.entry(id).await?;
        entry.conversation.lock().await.append(turn);
        Ok(())
    }

    /// Snapshot of a conversation's turns.
    pub async fn history(&self, id: &str) -> Result<Vec<Turn>> {
        let entry = self.entry(id).await?;
        let turns = entry.conversation.lock().await.turns.clone();
        Ok(turns)
    }

    /// Snapshot of a whole conversation, including timestamps.
    pub async fn get(&self, id: &str) -> Option<Conversation> {
        let entry = self.entry_opt(Some(id)).await?;
        let conversation = entry.conversation.lock().await.clone();
        Some(conversation)
    }

    /// Acquire the run lock of a conversation.
    ///
    /// The guard is owned, so it can be held across awaits for the whole run.
    pub async fn lock_run(&self, id: &str) -> Result<OwnedMutexGuard<()>> {
        let entry = self.entry(id).await?;
        Ok(entry.run_lock.clone().lock_owned().await)
    }

    /// Number of conversations in the store.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Ids of all conversations, unordered.
    pub async fn ids(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    async fn entry_opt(&self, id: Option<&str>) -> Option<Arc<Entry>> {
        let id = id?;
        self.entries.read().await.get(id).cloned()
    }

    async fn entry(&self, id: &str) -> Result<Arc<Entry>> {
        self.entry_opt(Some(id))
            .await
            .ok_or_else(|| PilotError::NotFound(format!("conversation {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_create_mints_id() {
        let store = ConversationStore::new();
        let (a, history) = store.get_or_create(None).await;
        assert!(history.is_empty());
        assert!(uuid::Uuid::parse_str(&a).is_ok());

        let (b, _) = store.get_or_create(None).await;
        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_adopted() {
        let store = ConversationStore::new();
        let (id, history) = store.get_or_create(Some("made-up")).await;
        assert_ne!(id, "made-up");
        assert!(history.is_empty());
        assert!(store.get("made-up").await.is_none());
    }

    #[tokio::test]
    async fn test_known_id_is_reused() {
        let store = ConversationStore::new();
        let (id, _) = store.get_or_create(None).await;
        store.append(&id, Turn::user("one")).await.unwrap();
        store.append(&id, Turn::model_text("two")).await.unwrap();

        let (again, history) = store.get_or_create(Some(&id)).await;
        assert_eq!(again, id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Turn::user("one"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_append_unknown_id_fails() {
        let store = ConversationStore::new();
        let err = store.append("nope", Turn::user("x")).await.unwrap_err();
        assert!(matches!(err, PilotError::NotFound(_)));
        assert!(store.history("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_appends_different_conversations() {
        let store = Arc::new(ConversationStore::new());
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(store.get_or_create(None).await.0);
        }

        let mut handles = Vec::new();
        for id in ids.clone() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store.append(&id, Turn::user(format!("{}", i))).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for id in ids {
            let history = store.history(&id).await.unwrap();
            assert_eq!(history.len(), 25);
            let texts: Vec<String> = history.iter().map(|t| t.text()).collect();
            let expected: Vec<String> = (0..25).map(|i| i.to_string()).collect();
            assert_eq!(texts, expected);
        }
    }

    #[tokio::test]
    async fn test_run_lock_serializes_same_conversation() {
        let store = Arc::new(ConversationStore::new());
        let (id, _) = store.get_or_create(None).await;

        let guard = store.lock_run(&id).await.unwrap();
        let store2 = store.clone();
        let id2 = id.clone();
        let waiter = tokio::spawn(async move {
            let _g = store2.lock_run(&id2).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_lock_independent_conversations() {
        let store = ConversationStore::new();
        let (a, _) = store.get_or_create(None).await;
        let (b, _) = store.get_or_create(None).await;
        let _ga = store.lock_run(&a).await.unwrap();
        let gb = tokio::time::timeout(Duration::from_millis(100), store.lock_run(&b)).await;
        assert!(gb.is_ok());
    }
}
