use std::collections::HashMap;

use authwire_core::SessionStorage;
use authwire_domain::Result;
use parking_lot::RwLock;

/// Session storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in changes {
            match value {
                Some(value) => entries.insert((*key).to_string(), (*value).to_string()),
                None => entries.remove(*key),
            };
        }
        Ok(())
    }
}
