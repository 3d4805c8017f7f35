use thiserror::Error;

/// type alias for all operations on a [`FrontableCache`] (and its engines) that could fail
/// with a [`CacheError`]
///
/// [`FrontableCache`]: ./struct.FrontableCache.html
pub type Result<T> = std::result::Result<T, CacheError>;

/// The Error variants used by the frontable cache, its persistence engines and the
/// inbound sync protocol.
#[derive(Error, Debug)]
pub enum CacheError {
    /// variant for errors caused from file IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// serde_json errors while reading/writing the command log
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// errors coming from the sled engine
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// a bounded collection or staging queue is already full, the item was dropped
    #[error("{what} is full (max {max}), item dropped")]
    CapacityExceeded {
        /// the collection that overflowed
        what: &'static str,
        /// its fixed maximum
        max: usize,
    },

    /// a persistence write was larger than the per-key payload limit
    #[error("payload of {len} bytes for key {key} exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// the storage key
        key: u32,
        /// the rejected payload length
        len: usize,
        /// the per-key maximum
        max: usize,
    },

    /// growing a collection failed to allocate
    #[error("out of memory growing a collection to {requested} items")]
    OutOfMemory {
        /// the capacity that could not be reserved
        requested: usize,
    },

    /// a malformed inbound sync fragment
    #[error("protocol error: {0}")]
    Protocol(String),

    /// persisted data could not be decoded
    #[error("corrupt persisted data: {0}")]
    Corrupt(String),

    /// errors while parsing command line options or persisted metadata
    #[error("{0}")]
    Parsing(String),
}
