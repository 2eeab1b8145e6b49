//! In-memory key-value store

use std::{
    collections::HashMap,
    sync::Mutex,
};

use super::KeyValueStore;
use crate::error::{Result, RoutineError};

/// Volatile store, used by tests and `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }

    /// Number of `put` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock()
            .map_err(|e| RoutineError::Lock(format!("memory store: {e}")))?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock()
            .map_err(|e| RoutineError::Lock(format!("memory store: {e}")))?;
        values.insert(key.to_string(), value.to_string());
        drop(values);

        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }
}
