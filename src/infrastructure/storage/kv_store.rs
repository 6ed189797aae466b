use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::shared::constants::DEFAULT_STORAGE_PREFIX;
use crate::shared::errors::StorageError;
use crate::shared::logging;

use super::memory::MemoryBackend;

const PROBE_KEY: &str = "__storage_probe__";

/// Raw string store underneath `KeyValueStore`
pub trait StorageBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[cfg(not(target_arch = "wasm32"))]
pub type SharedBackend = std::sync::Arc<dyn StorageBackend + Send + Sync>;

#[cfg(target_arch = "wasm32")]
pub type SharedBackend = std::rc::Rc<dyn StorageBackend>;

/// Wrap a backend for sharing between the store's clones
#[cfg(not(target_arch = "wasm32"))]
pub fn share<B: StorageBackend + Send + Sync + 'static>(backend: B) -> SharedBackend {
    std::sync::Arc::new(backend)
}

#[cfg(target_arch = "wasm32")]
pub fn share<B: StorageBackend + 'static>(backend: B) -> SharedBackend {
    std::rc::Rc::new(backend)
}

/// Typed, namespaced, failure-tolerant store.
///
/// Cloning is cheap and every clone talks to the same backend.
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Option<SharedBackend>,
    prefix: String,
}

impl KeyValueStore {
    /// Build a store and probe the backend once.
    ///
    /// If the probe fails the store stays disabled for its whole lifetime.
    pub fn new(backend: SharedBackend, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();

        let backend = match probe(backend.as_ref(), &prefix) {
            Ok(()) => Some(backend),
            Err(e) => {
                logging::log_storage_unavailable(&prefix, &e.to_string());
                None
            }
        };

        Self { backend, prefix }
    }

    /// A store that never persists anything
    pub fn disabled(prefix: impl Into<String>) -> Self {
        Self {
            backend: None,
            prefix: prefix.into(),
        }
    }

    /// Ephemeral store backed by memory with the default prefix
    pub fn in_memory() -> Self {
        Self::new(share(MemoryBackend::new()), DEFAULT_STORAGE_PREFIX)
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read and deserialize a value. Missing, unreadable or malformed
    /// entries all yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;
        let full_key = self.full_key(key);

        let raw = match backend.get_item(&full_key) {
            Ok(raw) => raw?,
            Err(e) => {
                logging::log_storage_failure("get", &full_key, &e.to_string());
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                logging::log_storage_failure("decode", &full_key, &e.to_string());
                None
            }
        }
    }

    /// Serialize and write a value; failures are logged and ignored
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let full_key = self.full_key(key);

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                logging::log_storage_failure("encode", &full_key, &e.to_string());
                return;
            }
        };

        if let Err(e) = backend.set_item(&full_key, &raw) {
            logging::log_storage_failure("set", &full_key, &e.to_string());
        }
    }

    pub fn remove(&self, key: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let full_key = self.full_key(key);

        if let Err(e) = backend.remove_item(&full_key) {
            logging::log_storage_failure("remove", &full_key, &e.to_string());
        }
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("prefix", &self.prefix)
            .field("available", &self.is_available())
            .finish()
    }
}

fn probe(backend: &dyn StorageBackend, prefix: &str) -> Result<(), StorageError> {
    let key = format!("{}{}", prefix, PROBE_KEY);
    backend.set_item(&key, "1")?;
    backend.remove_item(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_typed_roundtrip_is_prefixed() {
        let backend = MemoryBackend::new();
        let store = KeyValueStore::new(share(backend.clone()), "test_");

        store.set("sample", &Sample { name: "a".into(), count: 3 });

        assert_eq!(
            store.get::<Sample>("sample"),
            Some(Sample { name: "a".into(), count: 3 })
        );
        assert!(backend.get_item("test_sample").unwrap().is_some());
        assert!(backend.get_item("sample").unwrap().is_none());
    }

    #[test]
    fn test_probe_key_is_not_left_behind() {
        let backend = MemoryBackend::new();
        let _store = KeyValueStore::new(share(backend.clone()), "test_");

        assert!(backend.is_empty());
    }

    #[test]
    fn test_missing_and_malformed_values_are_none() {
        let backend = MemoryBackend::new();
        let store = KeyValueStore::new(share(backend.clone()), "test_");

        backend.set_item("test_broken", "{not json").unwrap();

        assert_eq!(store.get::<Sample>("absent"), None);
        assert_eq!(store.get::<Sample>("broken"), None);
    }

    #[test]
    fn test_remove() {
        let store = KeyValueStore::in_memory();
        store.set("flag", &true);
        store.remove("flag");

        assert_eq!(store.get::<bool>("flag"), None);
    }

    #[test]
    fn test_unavailable_backend_is_silent_noop() {
        let store = KeyValueStore::new(share(MemoryBackend::unavailable()), "test_");

        assert!(!store.is_available());
        store.set("flag", &true);
        store.remove("flag");
        assert_eq!(store.get::<bool>("flag"), None);
    }

    #[test]
    fn test_quota_exceeded_keeps_previous_value() {
        let backend = MemoryBackend::with_quota(64);
        let store = KeyValueStore::new(share(backend), "q_");

        store.set("small", "ok");
        store.set("small", &"x".repeat(500));

        assert!(store.is_available());
        assert_eq!(store.get::<String>("small").as_deref(), Some("ok"));
    }

    #[test]
    fn test_disabled_store() {
        let store = KeyValueStore::disabled("off_");
        store.set("n", &1);

        assert!(!store.is_available());
        assert_eq!(store.get::<i32>("n"), None);
        assert_eq!(store.prefix(), "off_");
    }
}
