//! Persistent, dictionary compressed encoding of a [`FrontableCache`].
//!
//! ## Key layout
//!
//! | key | contents |
//! |---|---|
//! | `PRONOUNS_KEY` | pronoun dictionary, `MAX_CACHED_PRONOUNS` NUL padded slots |
//! | `FRONTABLES_NUM_KEY` | number of stored frontables (i32) |
//! | `FRONTABLES_KEY_MIN..=FRONTABLES_KEY_MAX` | compact frontable records, chunked |
//! | `GROUPS_NUM_KEY` | number of stored groups (i32) |
//! | `GROUPS_KEY_MIN..=GROUPS_KEY_MAX` | compact group records, chunked |
//!
//! Every chunk key holds `MAX_PAYLOAD / record_size` records laid out back to back; the last
//! chunk only holds the remainder. All integers are little-endian.
//!
//! Compact frontable record (30 bytes): name `[20]`, hash `u32`, group bits `u32`,
//! pronoun index `u8` (0 = none, N = dictionary slot N-1), packed flags/color `u8`.
//!
//! Compact group record (22 bytes): name `[20]`, ARGB8 color `u8`, parent index `u8`
//! (0 = none, N = group N-1).
//!
//! Pronouns are only kept up to `COMPRESSED_PRONOUNS_LENGTH` bytes, and members whose
//! pronouns don't fit in the dictionary lose them on reload.

use std::ops::RangeInclusive;

use tracing::{debug, info, instrument, warn};

use super::FrontableCache;
use crate::engine::{PersistEngine, MAX_PAYLOAD};
use crate::error::{CacheError, Result};
use crate::frontable::{Frontable, GroupBits};
use crate::group::{Group, GroupId, MAX_GROUPS};
use crate::palette::PaletteColor;
use crate::string_tools::{copy_smaller, read_fixed, starts_same, write_fixed};

/// key of the pronoun dictionary blob
pub const PRONOUNS_KEY: u32 = 2;
/// key of the stored frontable count
pub const FRONTABLES_NUM_KEY: u32 = 3;
/// first frontable chunk key
pub const FRONTABLES_KEY_MIN: u32 = 4;
/// last frontable chunk key
pub const FRONTABLES_KEY_MAX: u32 = 20;
/// key of the stored group count
pub const GROUPS_NUM_KEY: u32 = 21;
/// first group chunk key
pub const GROUPS_KEY_MIN: u32 = 22;
/// last group chunk key
pub const GROUPS_KEY_MAX: u32 = 23;

/// max frontables written by a store, extra frontables are not persisted
pub const MAX_CACHED_FRONTABLES: usize = 128;
/// number of pronoun dictionary slots
pub const MAX_CACHED_PRONOUNS: usize = 22;
/// stored name length, without the terminator
pub const COMPRESSED_NAME_LENGTH: usize = 19;
/// stored pronoun length, without the terminator
pub const COMPRESSED_PRONOUNS_LENGTH: usize = 10;
/// stored group name length, without the terminator
pub const COMPRESSED_GROUP_NAME_LENGTH: usize = 19;

const PRONOUN_SLOT_SIZE: usize = COMPRESSED_PRONOUNS_LENGTH + 1;
const PRONOUN_MAP_SIZE: usize = MAX_CACHED_PRONOUNS * PRONOUN_SLOT_SIZE;

const NAME_FIELD: usize = COMPRESSED_NAME_LENGTH + 1;
const FRONTABLE_RECORD_SIZE: usize = NAME_FIELD + 4 + 4 + 1 + 1;
const FRONTABLES_PER_CHUNK: usize = MAX_PAYLOAD / FRONTABLE_RECORD_SIZE;

const GROUP_NAME_FIELD: usize = COMPRESSED_GROUP_NAME_LENGTH + 1;
const GROUP_RECORD_SIZE: usize = GROUP_NAME_FIELD + 1 + 1;
const GROUPS_PER_CHUNK: usize = MAX_PAYLOAD / GROUP_RECORD_SIZE;

const _: () = assert!(PRONOUN_MAP_SIZE <= MAX_PAYLOAD);
const _: () = assert!(
    FRONTABLES_PER_CHUNK * (FRONTABLES_KEY_MAX - FRONTABLES_KEY_MIN + 1) as usize
        >= MAX_CACHED_FRONTABLES
);
const _: () = assert!(GROUPS_PER_CHUNK * (GROUPS_KEY_MAX - GROUPS_KEY_MIN + 1) as usize >= MAX_GROUPS);

/// Shared table of (truncated) pronoun strings, referenced by one-based index.
#[derive(Debug, Default)]
struct PronounDictionary {
    slots: Vec<String>,
}

impl PronounDictionary {
    /// Collects distinct pronouns from `members`, in order, until every slot is used.
    fn build<'a>(members: impl Iterator<Item = &'a Frontable>) -> Self {
        let mut dict = PronounDictionary::default();
        for member in members {
            let pronouns = member.pronouns();
            if pronouns.is_empty() || dict.index_of(pronouns) != 0 {
                continue;
            }
            if dict.slots.len() >= MAX_CACHED_PRONOUNS {
                debug!(pronouns, "pronoun dictionary full");
                continue;
            }
            dict.slots.push(copy_smaller(pronouns, COMPRESSED_PRONOUNS_LENGTH));
        }
        dict
    }

    /// one-based slot matching `pronouns`, 0 if there is none
    fn index_of(&self, pronouns: &str) -> u8 {
        if pronouns.is_empty() {
            return 0;
        }
        self.slots
            .iter()
            .position(|slot| starts_same(slot, pronouns, COMPRESSED_PRONOUNS_LENGTH))
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }

    /// pronouns for a one-based index, `None` for 0
    fn get(&self, index: u8) -> Result<Option<&str>> {
        if index == 0 {
            return Ok(None);
        }
        match self.slots.get(index as usize - 1) {
            Some(slot) => Ok(Some(slot)),
            None => Err(CacheError::Corrupt(format!("pronoun index {} out of range", index))),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PRONOUN_MAP_SIZE);
        for i in 0..MAX_CACHED_PRONOUNS {
            let slot = self.slots.get(i).map(String::as_str).unwrap_or("");
            write_fixed(&mut out, slot, PRONOUN_SLOT_SIZE);
        }
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRONOUN_MAP_SIZE {
            return Err(CacheError::Corrupt(format!(
                "pronoun dictionary is {} bytes, expected {}",
                bytes.len(),
                PRONOUN_MAP_SIZE
            )));
        }
        let slots = bytes
            .chunks(PRONOUN_SLOT_SIZE)
            .map(read_fixed)
            .collect::<Result<Vec<_>>>()?;
        Ok(PronounDictionary { slots })
    }
}

fn encode_frontable(out: &mut Vec<u8>, f: &Frontable, pronoun_index: u8) {
    write_fixed(out, f.name(), NAME_FIELD);
    out.extend_from_slice(&f.hash.to_le_bytes());
    out.extend_from_slice(&f.groups.0.to_le_bytes());
    out.push(pronoun_index);
    out.push(f.packed());
}

/// Decoded compact frontable: the record, not fronting, plus its stored fronting flag
fn decode_frontable(record: &[u8], dict: &PronounDictionary) -> Result<(Frontable, bool)> {
    let name = read_fixed(&record[..NAME_FIELD])?;
    let hash = read_u32(&record[NAME_FIELD..NAME_FIELD + 4]);
    let bits = read_u32(&record[NAME_FIELD + 4..NAME_FIELD + 8]);
    let pronouns = dict.get(record[NAME_FIELD + 8])?;
    let packed = record[NAME_FIELD + 9];

    let mut f = Frontable::from_packed(hash, &name, pronouns, packed);
    let fronting = f.is_fronting();
    f.set_is_fronting(false);
    f.groups = GroupBits(bits);
    Ok((f, fronting))
}

fn encode_group(out: &mut Vec<u8>, group: &Group) {
    write_fixed(out, group.name(), GROUP_NAME_FIELD);
    out.push(group.color.argb());
    out.push(group.parent.map(|p| p.0 as u8 + 1).unwrap_or(0));
}

/// Decoded compact group, without its parent link, plus the stored one-based parent index
fn decode_group(record: &[u8]) -> Result<(Group, u8)> {
    let name = read_fixed(&record[..GROUP_NAME_FIELD])?;
    let color = PaletteColor::from_argb(record[GROUP_NAME_FIELD]);
    Ok((Group::create(&name, color, None), record[GROUP_NAME_FIELD + 1]))
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

/// Writes `records` across the `keys` range, `per_chunk` records per key, and deletes any
/// chunk keys left over from a larger previous store.
fn write_chunks<E: PersistEngine>(
    engine: &mut E,
    keys: RangeInclusive<u32>,
    records: &[u8],
    record_size: usize,
    per_chunk: usize,
) -> Result<()> {
    let mut chunks = records.chunks(record_size * per_chunk);
    for key in keys {
        match chunks.next() {
            Some(chunk) => engine.write(key, chunk)?,
            None => engine.delete(key)?,
        }
    }
    Ok(())
}

/// Reads `count` records back from the `keys` range.
fn read_chunks<E: PersistEngine>(
    engine: &E,
    keys: RangeInclusive<u32>,
    count: usize,
    record_size: usize,
    per_chunk: usize,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(count * record_size);
    let mut remaining = count;
    for key in keys {
        if remaining == 0 {
            break;
        }
        let num_to_load = remaining.min(per_chunk);
        let size = num_to_load * record_size;
        let chunk = engine
            .read(key)?
            .ok_or_else(|| CacheError::Corrupt(format!("missing chunk key {}", key)))?;
        if chunk.len() < size {
            return Err(CacheError::Corrupt(format!(
                "chunk key {} holds {} bytes, expected {}",
                key,
                chunk.len(),
                size
            )));
        }
        out.extend_from_slice(&chunk[..size]);
        remaining -= num_to_load;
    }
    if remaining > 0 {
        return Err(CacheError::Corrupt(format!(
            "{} records do not fit in the chunk key range",
            count
        )));
    }
    Ok(out)
}

fn read_count<E: PersistEngine>(engine: &E, key: u32, max: usize) -> Result<usize> {
    let count = engine.read_int(key)?.unwrap_or(0);
    if count < 0 || count as usize > max {
        return Err(CacheError::Corrupt(format!(
            "stored count {} under key {} is out of range",
            count, key
        )));
    }
    Ok(count as usize)
}

impl FrontableCache {
    /// Writes the whole cache (pronoun dictionary, groups and frontables) into `engine`.
    ///
    /// Custom fronts are written before members. Only the first `MAX_CACHED_FRONTABLES`
    /// frontables are stored.
    #[instrument(skip_all)]
    pub fn persist_store<E: PersistEngine>(&self, engine: &mut E) -> Result<()> {
        info!("storing frontable cache into persistent storage");

        let dict = PronounDictionary::build(self.members.iter());
        engine.write(PRONOUNS_KEY, &dict.to_bytes())?;
        debug!(pronouns = dict.slots.len(), "stored pronoun dictionary");

        let mut groups = Vec::with_capacity(self.groups.len() * GROUP_RECORD_SIZE);
        for (_, group) in self.groups.iter() {
            encode_group(&mut groups, group);
        }
        engine.write_int(GROUPS_NUM_KEY, self.groups.len() as i32)?;
        write_chunks(engine, GROUPS_KEY_MIN..=GROUPS_KEY_MAX, &groups, GROUP_RECORD_SIZE, GROUPS_PER_CHUNK)?;

        let total = self.custom_fronts.len() + self.members.len();
        if total > MAX_CACHED_FRONTABLES {
            warn!(total, max = MAX_CACHED_FRONTABLES, "too many frontables, extras are not persisted");
        }
        let mut frontables = Vec::with_capacity(total.min(MAX_CACHED_FRONTABLES) * FRONTABLE_RECORD_SIZE);
        let mut stored = 0;
        for f in self
            .custom_fronts
            .iter()
            .chain(self.members.iter())
            .take(MAX_CACHED_FRONTABLES)
        {
            let pronoun_index = if f.is_custom() { 0 } else { dict.index_of(f.pronouns()) };
            encode_frontable(&mut frontables, f, pronoun_index);
            stored += 1;
        }
        engine.write_int(FRONTABLES_NUM_KEY, stored as i32)?;
        write_chunks(
            engine,
            FRONTABLES_KEY_MIN..=FRONTABLES_KEY_MAX,
            &frontables,
            FRONTABLE_RECORD_SIZE,
            FRONTABLES_PER_CHUNK,
        )?;

        info!(frontables = stored, groups = self.groups.len(), "frontable cache stored");
        Ok(())
    }

    /// Replaces the cache contents with what was stored in `engine`.
    ///
    /// Returns `Ok(false)`, leaving the cache untouched, if nothing was ever stored. The cache
    /// is also untouched when loading fails; staged records are never affected.
    #[instrument(skip_all)]
    pub fn persist_load<E: PersistEngine>(&mut self, engine: &E) -> Result<bool> {
        info!("loading frontable cache from persistent storage");

        if !engine.exists(PRONOUNS_KEY)? || !engine.exists(FRONTABLES_NUM_KEY)? {
            debug!("cannot load persistent data if it was never saved in the first place");
            return Ok(false);
        }

        // decoded aside, the live collections only change once everything decoded
        let mut loaded = FrontableCache::new();

        let dict_bytes = engine
            .read(PRONOUNS_KEY)?
            .ok_or_else(|| CacheError::Corrupt("pronoun dictionary vanished".to_owned()))?;
        let dict = PronounDictionary::from_bytes(&dict_bytes)?;

        // groups first, frontable bits refer to their positions
        let num_groups = read_count(engine, GROUPS_NUM_KEY, MAX_GROUPS)?;
        let group_bytes = read_chunks(
            engine,
            GROUPS_KEY_MIN..=GROUPS_KEY_MAX,
            num_groups,
            GROUP_RECORD_SIZE,
            GROUPS_PER_CHUNK,
        )?;
        let mut parents = Vec::with_capacity(num_groups);
        for record in group_bytes.chunks(GROUP_RECORD_SIZE) {
            let (group, parent) = decode_group(record)?;
            loaded.add_group(group)?;
            parents.push(parent);
        }

        let num_frontables = read_count(engine, FRONTABLES_NUM_KEY, MAX_CACHED_FRONTABLES)?;
        let frontable_bytes = read_chunks(
            engine,
            FRONTABLES_KEY_MIN..=FRONTABLES_KEY_MAX,
            num_frontables,
            FRONTABLE_RECORD_SIZE,
            FRONTABLES_PER_CHUNK,
        )?;
        for record in frontable_bytes.chunks(FRONTABLE_RECORD_SIZE) {
            let (f, fronting) = decode_frontable(record, &dict)?;
            let hash = f.hash;
            loaded.add_frontable(f)?;
            if fronting {
                loaded.add_current_fronter(hash)?;
            }
        }
        loaded.relink_group_members()?;

        for (i, parent) in parents.into_iter().enumerate() {
            if parent == 0 {
                continue;
            }
            let parent = parent as usize - 1;
            if parent >= num_groups {
                warn!(group = i, parent, "stored parent index out of range");
                continue;
            }
            if let Some(group) = loaded.groups.get_mut(GroupId(i)) {
                group.parent = Some(GroupId(parent));
            }
        }

        self.members = loaded.members;
        self.custom_fronts = loaded.custom_fronts;
        self.current_fronters = loaded.current_fronters;
        self.groups = loaded.groups;
        self.index = loaded.index;

        info!(frontables = num_frontables, groups = num_groups, "frontable cache loaded");
        Ok(true)
    }
}

/// Removes every key the codec may have written. Safe to call when nothing was stored.
pub fn persist_delete<E: PersistEngine>(engine: &mut E) -> Result<()> {
    engine.delete(PRONOUNS_KEY)?;
    engine.delete(FRONTABLES_NUM_KEY)?;
    for key in FRONTABLES_KEY_MIN..=FRONTABLES_KEY_MAX {
        engine.delete(key)?;
    }
    engine.delete(GROUPS_NUM_KEY)?;
    for key in GROUPS_KEY_MIN..=GROUPS_KEY_MAX {
        engine.delete(key)?;
    }
    debug!("deleted persisted frontable cache");
    Ok(())
}
