use std::collections::HashMap;

use super::{check_payload, PersistEngine};
use crate::error::Result;

/// A [`PersistEngine`] kept entirely in memory. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    map: HashMap<u32, Vec<u8>>,
}

impl MemoryEngine {
    /// an empty store
    pub fn new() -> Self {
        MemoryEngine::default()
    }

    /// number of keys currently stored
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// true if no key is stored
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// total bytes stored across all keys
    pub fn bytes_used(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }
}

impl PersistEngine for MemoryEngine {
    fn exists(&self, key: u32) -> Result<bool> {
        Ok(self.map.contains_key(&key))
    }

    fn read(&self, key: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.map.get(&key).cloned())
    }

    fn write(&mut self, key: u32, data: &[u8]) -> Result<()> {
        check_payload(key, data)?;
        self.map.insert(key, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: u32) -> Result<()> {
        self.map.remove(&key);
        Ok(())
    }
}
