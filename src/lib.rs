#![deny(missing_docs)]
//! An on-device cache of the "frontables" (members and custom fronts) and groups of a plural
//! system, synchronized from a paired phone and persisted into a small key/value store.
//!
//! This crate provides the [`FrontableCache`] itself, the [`SyncHandler`] that assembles
//! fragmented updates from the phone into it, and the storage engines the cache is persisted
//! to. A `plurble-cache` executable is provided to replay recorded phone messages into a
//! persisted cache and to inspect it.
//!
//! ## FrontableCache
//! [`FrontableCache`] owns the canonical collections:
//!
//! - members and custom fronts, each an owning [`List`] of [`Frontable`] records
//! - the current fronters, a list of non-owning [`FrontableRef`] handles into those records
//! - the groups, a bounded [`GroupCollection`] addressed by [`GroupId`]
//!
//! Frontables are found by their 32 bit hash through a hash index. Groups reference their
//! members by hash, and each frontable carries a [`GroupBits`] bitfield of the groups it
//! belongs to.
//!
//! ## Sync Protocol
//! The phone sends each refresh as a "begin" message with the total record count, followed by
//! column encoded batches (all hashes in one byte array, all names in one `;` joined string,
//! and so on). Batches are decoded and staged; once the declared total has arrived the live
//! collection is replaced in one step. See the [`sync`] module.
//!
//! ## Persistence
//! The cache is written with [`FrontableCache::persist_store`] into any [`PersistEngine`], a
//! key/value store holding at most [`MAX_PAYLOAD`] bytes per key. Records are compacted into
//! fixed-width binary records, pronouns go through a shared dictionary, and the record arrays
//! are split into chunks across a range of keys. [`FrontableCache::persist_load`] returns
//! `Ok(false)` when nothing was ever stored.
//!
//! Three engines are provided:
//! - [`MemoryEngine`], a plain in-memory map
//! - [`LogEngine`], which appends JSON records to numbered ".log" segments (1.log, 2.log, ...)
//!   and compacts them once enough stale data has built up
//! - [`SledEngine`], a wrapper around the [`sled`] embedded database
//!
//! [`sled`]: https://docs.rs/sled/latest/sled/

pub use cache::{
    persist_delete, FrontableCache, FrontableKind, FrontableRef, MAX_STAGED_FRONTABLES,
    MAX_STAGED_FRONTERS,
};
pub use engine::{LogEngine, MemoryEngine, PersistEngine, SledEngine, MAX_PAYLOAD};
pub use error::{CacheError, Result};
pub use frontable::{Frontable, GroupBits, FRONTABLE_NAME_LENGTH, FRONTABLE_PRONOUNS_LENGTH};
pub use group::{Group, GroupCollection, GroupId, GROUP_NAME_LENGTH, MAX_GROUPS};
pub use list::{DeepClear, List, Owned};
pub use palette::PaletteColor;
pub use sync::{InboundMessage, SyncEvent, SyncHandler, TransferState};

pub mod cache;
pub mod engine;
mod error;
mod frontable;
mod group;
mod list;
pub mod palette;
pub mod string_tools;
pub mod sync;
