use std::cell::RefCell;

use super::{KeyValueStore, StorageError};

/// Process-local store; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.items.borrow().len())
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(index).map(|(key, _)| key.clone()))
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .items
            .borrow()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.borrow_mut();
        match items.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = value.to_string(),
            None => items.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().retain(|(existing, _)| existing != key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.items.borrow_mut().clear();
        Ok(())
    }
}
