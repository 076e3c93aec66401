use crate::logging;
use crate::memory::MemoryProfile;
use crate::prompt;
use crate::store::{Store, CHAT_KEY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Append-only conversation, headed by the system turn built when it was (re)initialized.
/// The persisted record never contains system turns.
pub struct HistoryManager {
    turns: Vec<ConversationTurn>,
    store: Arc<dyn Store>,
    session_id: String,
}

impl HistoryManager {
    pub fn initialize(store: Arc<dyn Store>, profile: &MemoryProfile, session_id: &str) -> Self {
        let saved = load_saved_turns(store.as_ref(), session_id);

        logging::log_history(
            Some(session_id),
            &format!("Restored {} turns", saved.len()),
        );

        let mut turns = Vec::with_capacity(saved.len() + 1);
        turns.push(prompt::build_system_message(profile));
        turns.extend(saved);

        Self {
            turns,
            store,
            session_id: session_id.to_string(),
        }
    }

    /// Full in-memory sequence, system head included
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// What gets written to the store: non-system turns in original order
    pub fn persisted_form(&self) -> Vec<ConversationTurn> {
        self.turns
            .iter()
            .filter(|turn| !turn.is_system())
            .cloned()
            .collect()
    }

    pub fn append_user(&mut self, text: &str) {
        self.turns.push(ConversationTurn::user(text));
        self.persist();
    }

    pub fn append_assistant(&mut self, text: &str) {
        self.turns.push(ConversationTurn::assistant(text));
        self.persist();
    }

    /// Best effort write; failures are logged and the in-memory sequence stays authoritative
    pub fn persist(&self) {
        let result = serde_json::to_string(&self.persisted_form())
            .map_err(crate::error::StoreError::from)
            .and_then(|raw| self.store.set(CHAT_KEY, &raw));

        if let Err(e) = result {
            logging::log_error(
                Some(&self.session_id),
                &format!("Failed to persist history: {}", e),
            );
        }
    }

    /// Forget the saved conversation and start over with one fresh system turn
    pub fn reset(&mut self, profile: &MemoryProfile) {
        if let Err(e) = self.store.remove(CHAT_KEY) {
            logging::log_error(
                Some(&self.session_id),
                &format!("Failed to clear saved history: {}", e),
            );
        }
        self.turns = vec![prompt::build_system_message(profile)];
        logging::log_history(Some(&self.session_id), "History reset");
    }
}

fn load_saved_turns(store: &dyn Store, session_id: &str) -> Vec<ConversationTurn> {
    let raw = match store.get(CHAT_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            logging::log_error(Some(session_id), &format!("Failed to load history: {}", e));
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<ConversationTurn>>(&raw) {
        Ok(turns) => turns.into_iter().filter(|turn| !turn.is_system()).collect(),
        Err(e) => {
            logging::log_error(
                Some(session_id),
                &format!("Saved history unreadable, starting empty: {}", e),
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    struct FailingStore;

    impl Store for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("storage unavailable")))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("quota exceeded")))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("quota exceeded")))
        }
    }

    fn fresh(store: Arc<dyn Store>) -> HistoryManager {
        HistoryManager::initialize(store, &MemoryProfile::default(), "test-session")
    }

    #[test]
    fn test_initialize_without_saved_history() {
        let history = fresh(Arc::new(MemoryStore::new()));
        assert_eq!(history.turns().len(), 1);
        assert!(history.turns()[0].is_system());
    }

    #[test]
    fn test_round_trip_through_store() {
        let store = Arc::new(MemoryStore::new());
        let mut history = fresh(store.clone());
        history.append_user("hi");
        history.append_assistant("hello");
        history.persist();

        let restored = fresh(store);
        assert_eq!(restored.turns().len(), 3);
        assert!(restored.turns()[0].is_system());
        assert_eq!(
            restored.persisted_form(),
            vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")]
        );
    }

    #[test]
    fn test_persisted_record_has_no_system_turns() {
        let store = Arc::new(MemoryStore::new());
        let mut history = fresh(store.clone());
        history.append_user("bonjour");

        let raw = store.get(CHAT_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"[{"role":"user","content":"bonjour"}]"#);
    }

    #[test]
    fn test_system_entries_in_record_are_dropped() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                CHAT_KEY,
                r#"[{"role":"system","content":"old"},{"role":"user","content":"hi"}]"#,
            )
            .unwrap();

        let history = fresh(store);
        assert_eq!(history.turns().len(), 2);
        assert_eq!(history.turns()[1], ConversationTurn::user("hi"));
    }

    #[test]
    fn test_unreadable_record_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(CHAT_KEY, "not json").unwrap();
        assert_eq!(fresh(store).turns().len(), 1);
    }

    #[test]
    fn test_head_uses_profile_at_initialize() {
        let profile = MemoryProfile {
            name: Some("Eve".to_string()),
            ..MemoryProfile::default()
        };
        let history = HistoryManager::initialize(Arc::new(MemoryStore::new()), &profile, "s");
        assert!(history.turns()[0].content.contains("Name: Eve"));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut history = fresh(store.clone());
        history.append_user("hi");

        history.reset(&MemoryProfile::default());
        let first = history.turns().to_vec();
        history.reset(&MemoryProfile::default());

        assert_eq!(history.turns(), first.as_slice());
        assert_eq!(history.turns().len(), 1);
        assert_eq!(store.get(CHAT_KEY).unwrap(), None);
    }

    #[test]
    fn test_failing_store_keeps_memory_authoritative() {
        let mut history = fresh(Arc::new(FailingStore));
        assert_eq!(history.turns().len(), 1);

        history.append_user("hi");
        history.append_assistant("hello");
        history.persist();
        assert_eq!(
            history.persisted_form(),
            vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")]
        );

        history.reset(&MemoryProfile::default());
        assert_eq!(history.turns().len(), 1);
    }
}
