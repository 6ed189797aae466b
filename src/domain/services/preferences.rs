use crate::infrastructure::storage::KeyValueStore;
use crate::shared::constants::keys;

/// Persisted widget chrome state: open/closed flag and unread counter.
///
/// The session controller never reads these; they belong to the UI layer.
#[derive(Debug, Clone)]
pub struct WidgetPreferences {
    store: KeyValueStore,
}

impl WidgetPreferences {
    pub fn new(store: KeyValueStore) -> Self {
        Self { store }
    }

    pub fn is_open(&self) -> bool {
        self.store.get(keys::WIDGET_OPEN).unwrap_or(false)
    }

    /// Opening the widget marks everything as read
    pub fn set_open(&self, open: bool) {
        self.store.set(keys::WIDGET_OPEN, &open);
        if open {
            self.mark_read();
        }
    }

    pub fn unread_count(&self) -> u32 {
        self.store.get(keys::UNREAD_COUNT).unwrap_or(0)
    }

    /// Count an assistant reply that arrived while the widget was closed
    pub fn increment_unread(&self) -> u32 {
        if self.is_open() {
            return 0;
        }
        let count = self.unread_count().saturating_add(1);
        self.store.set(keys::UNREAD_COUNT, &count);
        count
    }

    pub fn mark_read(&self) {
        self.store.set(keys::UNREAD_COUNT, &0u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = WidgetPreferences::new(KeyValueStore::in_memory());

        assert!(!prefs.is_open());
        assert_eq!(prefs.unread_count(), 0);
    }

    #[test]
    fn test_unread_counts_only_while_closed() {
        let prefs = WidgetPreferences::new(KeyValueStore::in_memory());

        assert_eq!(prefs.increment_unread(), 1);
        assert_eq!(prefs.increment_unread(), 2);

        prefs.set_open(true);
        assert_eq!(prefs.unread_count(), 0);
        assert_eq!(prefs.increment_unread(), 0);

        prefs.set_open(false);
        assert_eq!(prefs.increment_unread(), 1);
    }

    #[test]
    fn test_state_survives_new_instance() {
        let store = KeyValueStore::in_memory();
        WidgetPreferences::new(store.clone()).set_open(true);

        assert!(WidgetPreferences::new(store).is_open());
    }
}
