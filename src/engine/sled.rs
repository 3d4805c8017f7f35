use std::path::Path;

use sled::Db;
use tracing::debug;

use super::{check_payload, PersistEngine};
use crate::error::Result;

/// Wrapper around a [`sled::Db`]. Keys are stored as big-endian bytes so they sort numerically.
#[derive(Clone)]
pub struct SledEngine(Db);

impl SledEngine {
    /// creates a `SledEngine` from an already opened `sled::Db`
    pub fn new(db: Db) -> Self {
        SledEngine(db)
    }

    /// opens (or creates) a sled database in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        debug!(?dir, "opening sled engine");
        Ok(SledEngine(sled::open(dir)?))
    }
}

impl PersistEngine for SledEngine {
    fn exists(&self, key: u32) -> Result<bool> {
        Ok(self.0.contains_key(key.to_be_bytes())?)
    }

    fn read(&self, key: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .0
            .get(key.to_be_bytes())?
            .map(|ivec| ivec.to_vec()))
    }

    fn write(&mut self, key: u32, data: &[u8]) -> Result<()> {
        check_payload(key, data)?;
        self.0.insert(key.to_be_bytes(), data)?;
        self.0.flush()?;
        Ok(())
    }

    fn delete(&mut self, key: u32) -> Result<()> {
        self.0.remove(key.to_be_bytes())?;
        self.0.flush()?;
        Ok(())
    }
}
