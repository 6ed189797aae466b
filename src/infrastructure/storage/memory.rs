use std::sync::Arc;

use dashmap::DashMap;

use crate::shared::errors::StorageError;

use super::kv_store::StorageBackend;

#[derive(Debug, Clone, Copy)]
enum Mode {
    Normal,
    /// Every call fails, like a browser with storage disabled
    Unavailable,
    /// Writes fail once the stored bytes would exceed the limit
    Quota(usize),
}

/// In-memory backend.
///
/// Clones share the same entries, which lets tests inspect or seed what a
/// `KeyValueStore` sees.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<DashMap<String, String>>,
    mode: Mode,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            mode: Mode::Normal,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            mode: Mode::Unavailable,
            ..Self::new()
        }
    }

    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            mode: Mode::Quota(max_bytes),
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Mode::Unavailable = self.mode {
            return Err(StorageError::Unavailable("memory backend disabled".into()));
        }
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self.mode {
            Mode::Unavailable => {
                return Err(StorageError::Unavailable("memory backend disabled".into()));
            }
            Mode::Quota(max_bytes) => {
                if self.used_bytes_without(key) + key.len() + value.len() > max_bytes {
                    return Err(StorageError::QuotaExceeded(key.to_string()));
                }
            }
            Mode::Normal => {}
        }

        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if let Mode::Unavailable = self.mode {
            return Err(StorageError::Unavailable("memory backend disabled".into()));
        }
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let backend = MemoryBackend::new();
        let other = backend.clone();

        backend.set_item("k", "v").unwrap();

        assert_eq!(other.get_item("k").unwrap().as_deref(), Some("v"));
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_quota_counts_replaced_value_once() {
        let backend = MemoryBackend::with_quota(10);

        backend.set_item("k", "12345").unwrap();
        backend.set_item("k", "123456789").unwrap();

        assert!(matches!(
            backend.set_item("k", "1234567890"),
            Err(StorageError::QuotaExceeded(_))
        ));
    }
}
