//! This module provides the persistent key/value blob stores the frontable cache is written to.
//! Three engines are implemented: [`MemoryEngine`], the file based [`LogEngine`], and a wrapper
//! around the [`sled`] database engine.
//!
//! Every engine behaves like the watch's persistent storage: integer keys, and at most
//! [`MAX_PAYLOAD`] bytes stored per key.
//!
//! [`sled`]: https://docs.rs/sled/latest/sled/
use crate::error::{CacheError, Result};

/// maximum number of bytes a single key may hold
pub const MAX_PAYLOAD: usize = 256;

/// A trait for the basic functionality of a fixed-payload key/value storage engine
pub trait PersistEngine {
    /// true if something is stored under `key`
    fn exists(&self, key: u32) -> Result<bool>;

    /// Gets the bytes stored under `key`
    ///
    /// Returns `None` if the given `key` does not exist.
    fn read(&self, key: u32) -> Result<Option<Vec<u8>>>;

    /// Stores `data` under `key`, overwriting any previous value
    ///
    /// # Errors
    ///
    /// Returns `CacheError::PayloadTooLarge` if `data` is longer than [`MAX_PAYLOAD`].
    fn write(&mut self, key: u32, data: &[u8]) -> Result<()>;

    /// Removes `key`. Removing a key that does not exist is not an error.
    fn delete(&mut self, key: u32) -> Result<()>;

    /// stores a 32 bit integer under `key`
    fn write_int(&mut self, key: u32, value: i32) -> Result<()> {
        self.write(key, &value.to_le_bytes())
    }

    /// Reads a 32 bit integer previously stored with [`write_int`](PersistEngine::write_int)
    ///
    /// Returns `None` if the given `key` does not exist.
    fn read_int(&self, key: u32) -> Result<Option<i32>> {
        match self.read(key)? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    CacheError::Corrupt(format!("key {} holds {} bytes, not an int", key, bytes.len()))
                })?;
                Ok(Some(i32::from_le_bytes(raw)))
            }
        }
    }
}

/// rejects payloads an engine may not store
pub(crate) fn check_payload(key: u32, data: &[u8]) -> Result<()> {
    if data.len() > MAX_PAYLOAD {
        return Err(CacheError::PayloadTooLarge {
            key,
            len: data.len(),
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

mod log;
mod memory;
mod sled;

pub use self::log::LogEngine;
pub use self::memory::MemoryEngine;
pub use self::sled::SledEngine;
