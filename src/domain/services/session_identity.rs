//! Session identity manager
//!
//! Owns the current session id. The in-memory value is authoritative for
//! the lifetime of the instance; the store only carries it across reloads.

use chrono::Utc;
use uuid::Uuid;

use crate::infrastructure::storage::KeyValueStore;
use crate::shared::constants::{SESSION_ID_PREFIX, SESSION_ID_RANDOM_LEN, keys};
use crate::shared::logging;

#[derive(Debug, Clone)]
pub struct SessionIdentity {
    store: KeyValueStore,
    current: Option<String>,
}

impl SessionIdentity {
    pub fn new(store: KeyValueStore) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Persisted id if there is a well-formed one, otherwise a fresh id.
    ///
    /// Repeated calls return the same id until `rotate` is called, even when
    /// the store is unavailable.
    pub fn get_or_create_session_id(&mut self) -> String {
        if let Some(id) = &self.current {
            return id.clone();
        }

        let id = match self.store.get::<String>(keys::SESSION_ID) {
            Some(id) if is_well_formed(&id) => id,
            _ => self.generate_and_persist(),
        };

        self.current = Some(id.clone());
        id
    }

    /// Replace the current id unconditionally and return the new one.
    /// The message cache is not touched.
    pub fn rotate(&mut self) -> String {
        let id = self.generate_and_persist();
        self.current = Some(id.clone());
        id
    }

    fn generate_and_persist(&self) -> String {
        let id = generate_session_id();
        self.store.set(keys::SESSION_ID, &id);
        logging::log_session_created(&id, self.store.is_available());
        id
    }
}

/// `session_<unix millis>_<random>`
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        SESSION_ID_PREFIX,
        Utc::now().timestamp_millis(),
        &random[..SESSION_ID_RANDOM_LEN]
    )
}

/// Whether `id` has the shape produced by `generate_session_id`
pub fn is_well_formed(id: &str) -> bool {
    let mut parts = id.splitn(3, '_');
    let (Some(prefix), Some(millis), Some(random)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    prefix == SESSION_ID_PREFIX
        && !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && !random.is_empty()
        && random.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::{MemoryBackend, share};

    fn store_with(backend: &MemoryBackend) -> KeyValueStore {
        KeyValueStore::new(share(backend.clone()), "t_")
    }

    #[test]
    fn test_generated_ids_are_well_formed_and_unique() {
        let a = generate_session_id();
        let b = generate_session_id();

        assert!(is_well_formed(&a), "{}", a);
        assert!(is_well_formed(&b), "{}", b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_well_formed() {
        assert!(is_well_formed("session_1700000000000_abc123xyz"));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("session__abc"));
        assert!(!is_well_formed("session_12_"));
        assert!(!is_well_formed("chat_1700000000000_abc"));
        assert!(!is_well_formed("session_17000x_abc"));
        assert!(!is_well_formed("session_1700_ab-c"));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let backend = MemoryBackend::new();
        let mut identity = SessionIdentity::new(store_with(&backend));

        let first = identity.get_or_create_session_id();
        let second = identity.get_or_create_session_id();

        assert_eq!(first, second);
    }

    #[test]
    fn test_persisted_id_is_reused_across_instances() {
        let backend = MemoryBackend::new();
        let first = SessionIdentity::new(store_with(&backend)).get_or_create_session_id();
        let second = SessionIdentity::new(store_with(&backend)).get_or_create_session_id();

        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_persisted_id_is_replaced() {
        let backend = MemoryBackend::new();
        let store = store_with(&backend);
        store.set(keys::SESSION_ID, "");

        let id = SessionIdentity::new(store.clone()).get_or_create_session_id();

        assert!(is_well_formed(&id));
        assert_eq!(store.get::<String>(keys::SESSION_ID), Some(id));
    }

    #[test]
    fn test_rotate_persists_new_id() {
        let backend = MemoryBackend::new();
        let store = store_with(&backend);
        let mut identity = SessionIdentity::new(store.clone());

        let before = identity.get_or_create_session_id();
        let after = identity.rotate();

        assert_ne!(before, after);
        assert_eq!(identity.get_or_create_session_id(), after);
        assert_eq!(store.get::<String>(keys::SESSION_ID), Some(after));
    }

    #[test]
    fn test_unavailable_store_still_yields_stable_ids() {
        let mut identity =
            SessionIdentity::new(KeyValueStore::new(share(MemoryBackend::unavailable()), "t_"));

        let first = identity.get_or_create_session_id();
        assert!(is_well_formed(&first));
        assert_eq!(identity.get_or_create_session_id(), first);

        // Nothing was persisted: a reload starts a new session
        let mut reloaded =
            SessionIdentity::new(KeyValueStore::new(share(MemoryBackend::unavailable()), "t_"));
        assert_ne!(reloaded.get_or_create_session_id(), first);
    }
}
