//! The on-device catalog of frontables and groups.
//!
//! A [`FrontableCache`] is created once per running application and passed to everything
//! that needs it. It is not thread safe; all access happens on the event loop thread.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::frontable::{Frontable, GroupBits};
use crate::group::{Group, GroupCollection, GroupId, MAX_GROUPS};
use crate::list::{DeepClear, List};

pub use self::codec::{
    persist_delete, COMPRESSED_GROUP_NAME_LENGTH, COMPRESSED_NAME_LENGTH,
    COMPRESSED_PRONOUNS_LENGTH, FRONTABLES_KEY_MAX, FRONTABLES_KEY_MIN, FRONTABLES_NUM_KEY,
    GROUPS_KEY_MAX, GROUPS_KEY_MIN, GROUPS_NUM_KEY, MAX_CACHED_FRONTABLES, MAX_CACHED_PRONOUNS,
    PRONOUNS_KEY,
};
pub use self::staging::StagingQueue;

mod codec;
mod staging;

/// max frontables held by the staging queue of one transfer
pub const MAX_STAGED_FRONTABLES: usize = 512;
/// max current fronter hashes held by the staging queue of one transfer
pub const MAX_STAGED_FRONTERS: usize = 64;

/// Which owning collection a frontable lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontableKind {
    /// a system member
    Member,
    /// a custom front
    Custom,
}

/// Non-owning handle to a frontable stored in the cache. Handles are invalidated by any
/// call that clears or replaces the frontable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrontableRef {
    kind: FrontableKind,
    index: usize,
}

/// The canonical collections of frontables and groups, plus the staging queues used while a
/// sync transfer is in progress.
#[derive(Debug)]
pub struct FrontableCache {
    members: List<Frontable>,
    custom_fronts: List<Frontable>,
    current_fronters: List<FrontableRef>,
    groups: GroupCollection,

    // hash -> first frontable with that hash, members take precedence over custom fronts
    index: HashMap<u32, FrontableRef>,

    staged_frontables: StagingQueue<Frontable>,
    staged_groups: StagingQueue<Group>,
    staged_fronters: StagingQueue<u32>,
}

impl Default for FrontableCache {
    fn default() -> Self {
        FrontableCache::new()
    }
}

impl FrontableCache {
    /// an empty cache
    pub fn new() -> Self {
        FrontableCache {
            members: List::new(),
            custom_fronts: List::new(),
            current_fronters: List::new(),
            groups: GroupCollection::new(),
            index: HashMap::new(),
            staged_frontables: StagingQueue::new("frontable staging queue", MAX_STAGED_FRONTABLES),
            staged_groups: StagingQueue::new("group staging queue", MAX_GROUPS),
            staged_fronters: StagingQueue::new("current fronter staging queue", MAX_STAGED_FRONTERS),
        }
    }

    /// the members collection
    pub fn get_members(&self) -> &List<Frontable> {
        &self.members
    }

    /// the custom fronts collection
    pub fn get_custom_fronts(&self) -> &List<Frontable> {
        &self.custom_fronts
    }

    /// handles of the current fronters, in the order they were added
    pub fn get_current_fronters(&self) -> &List<FrontableRef> {
        &self.current_fronters
    }

    /// the group collection
    pub fn get_groups(&self) -> &GroupCollection {
        &self.groups
    }

    /// iterates the current fronters' records
    pub fn current_fronters(&self) -> impl Iterator<Item = &Frontable> + '_ {
        self.current_fronters.iter().filter_map(move |r| self.resolve(*r))
    }

    /// the zeroth current fronter, used as "who is fronting"
    pub fn get_first_fronter(&self) -> Option<&Frontable> {
        self.current_fronters.first().and_then(|r| self.resolve(*r))
    }

    /// The record behind a handle, or `None` if a clear or flush has invalidated it.
    pub fn resolve(&self, r: FrontableRef) -> Option<&Frontable> {
        match r.kind {
            FrontableKind::Member => self.members.get(r.index),
            FrontableKind::Custom => self.custom_fronts.get(r.index),
        }
    }

    fn resolve_mut(&mut self, r: FrontableRef) -> Option<&mut Frontable> {
        match r.kind {
            FrontableKind::Member => self.members.get_mut(r.index),
            FrontableKind::Custom => self.custom_fronts.get_mut(r.index),
        }
    }

    /// handle of the first frontable with `hash`, searching members before custom fronts
    pub fn find(&self, hash: u32) -> Option<FrontableRef> {
        self.index.get(&hash).copied()
    }

    /// the first frontable with `hash`, searching members before custom fronts
    pub fn get_frontable(&self, hash: u32) -> Option<&Frontable> {
        self.find(hash).and_then(|r| self.resolve(r))
    }

    /// mutable access to the first frontable with `hash`
    pub fn get_frontable_mut(&mut self, hash: u32) -> Option<&mut Frontable> {
        let r = self.find(hash)?;
        self.resolve_mut(r)
    }

    /// adds `frontable` to the custom fronts or the members, depending on `is_custom`
    pub fn add_frontable(&mut self, frontable: Frontable) -> Result<FrontableRef> {
        let hash = frontable.hash;
        let r = if frontable.is_custom() {
            self.custom_fronts.add(frontable)?;
            FrontableRef {
                kind: FrontableKind::Custom,
                index: self.custom_fronts.len() - 1,
            }
        } else {
            self.members.add(frontable)?;
            FrontableRef {
                kind: FrontableKind::Member,
                index: self.members.len() - 1,
            }
        };

        match self.index.entry(hash) {
            Entry::Vacant(e) => {
                e.insert(r);
            }
            Entry::Occupied(mut e) => {
                warn!(hash, "duplicate frontable hash");
                if e.get().kind == FrontableKind::Custom && r.kind == FrontableKind::Member {
                    e.insert(r);
                }
            }
        }
        Ok(r)
    }

    /// Drops every member and custom front. Current fronters are cleared first so no handle
    /// to a dropped record survives.
    pub fn clear_frontables(&mut self) {
        self.clear_current_fronters();
        let dropped = self.members.deep_clear() + self.custom_fronts.deep_clear();
        self.index.clear();
        debug!(dropped, "cleared frontables");
    }

    /// Marks the frontable with `hash` as fronting and appends it to the current fronters.
    /// Unknown hashes and frontables that are already fronting are ignored.
    pub fn add_current_fronter(&mut self, hash: u32) -> Result<()> {
        let r = match self.find(hash) {
            Some(r) => r,
            None => {
                debug!(hash, "ignoring unknown current fronter");
                return Ok(());
            }
        };
        if self.current_fronters.contains(&r) {
            return Ok(());
        }
        self.current_fronters.add(r)?;
        if let Some(f) = self.resolve_mut(r) {
            f.set_is_fronting(true);
        }
        Ok(())
    }

    /// removes the frontable with `hash` from the current fronters, if it is there
    pub fn remove_current_fronter(&mut self, hash: u32) {
        let r = match self.find(hash) {
            Some(r) => r,
            None => return,
        };
        if self.current_fronters.remove_first(|c| *c == r).is_some() {
            if let Some(f) = self.resolve_mut(r) {
                f.set_is_fronting(false);
            }
        }
    }

    /// makes the frontable with `hash` the only current fronter
    pub fn set_as_front(&mut self, hash: u32) -> Result<()> {
        self.clear_current_fronters();
        self.add_current_fronter(hash)
    }

    /// unmarks every current fronter, then empties the list
    pub fn clear_current_fronters(&mut self) {
        let fronters: Vec<FrontableRef> = self.current_fronters.iter().copied().collect();
        for r in fronters {
            if let Some(f) = self.resolve_mut(r) {
                f.set_is_fronting(false);
            }
        }
        self.current_fronters.clear();
    }

    /// Appends `group` to the bounded group collection.
    ///
    /// # Errors
    /// returns `CacheError::CapacityExceeded` once the collection holds `MAX_GROUPS` groups
    pub fn add_group(&mut self, group: Group) -> Result<GroupId> {
        self.groups.add(group)
    }

    /// drops every group and every frontable's group bits
    pub fn clear_groups(&mut self) {
        self.groups.deep_clear();
        for f in self.members.iter_mut().chain(self.custom_fronts.iter_mut()) {
            f.groups = GroupBits::default();
        }
    }

    /// Puts the frontable with `hash` into the group `id`, updating both the group's member
    /// list and the frontable's group bits. Unknown groups are ignored.
    pub fn add_to_group(&mut self, hash: u32, id: GroupId) -> Result<()> {
        match self.groups.get_mut(id) {
            Some(group) => group.add_member(hash)?,
            None => {
                debug!(hash, group = id.0, "ignoring unknown group");
                return Ok(());
            }
        }
        if let Some(f) = self.get_frontable_mut(hash) {
            f.groups.insert(id.0);
        }
        Ok(())
    }

    /// ids of the groups the frontable with `hash` belongs to
    pub fn frontable_groups(&self, hash: u32) -> Vec<GroupId> {
        self.get_frontable(hash)
            .map(|f| f.groups.iter().map(GroupId).collect())
            .unwrap_or_default()
    }

    /// groups directly below `parent`, or the root groups for `None`
    pub fn children_of(&self, parent: Option<GroupId>) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.children_of(parent)
    }

    /// drops everything the cache holds, staged records included
    pub fn deinit(&mut self) {
        self.clear_current_fronters();
        self.clear_frontables();
        self.clear_groups();
        self.staged_frontables.reset();
        self.staged_groups.reset();
        self.staged_fronters.reset();
    }

    // ~~~ staged updates ~~~

    /// discards any staged frontables, starting a new transfer
    pub fn begin_frontables(&mut self) {
        if !self.staged_frontables.is_empty() {
            warn!(staged = self.staged_frontables.len(), "abandoning unfinished frontable transfer");
        }
        self.staged_frontables.reset();
    }

    /// discards any staged groups, starting a new transfer
    pub fn begin_groups(&mut self) {
        if !self.staged_groups.is_empty() {
            warn!(staged = self.staged_groups.len(), "abandoning unfinished group transfer");
        }
        self.staged_groups.reset();
    }

    /// discards any staged fronter hashes, starting a new transfer
    pub fn begin_current_fronters(&mut self) {
        self.staged_fronters.reset();
    }

    /// stages one frontable, see [`stage_frontables`](FrontableCache::stage_frontables)
    pub fn stage_frontable(&mut self, frontable: Frontable) -> Result<()> {
        self.staged_frontables.push_all(vec![frontable])
    }

    /// Stages a whole batch of frontables, or none of them if the staging queue would overflow.
    pub fn stage_frontables(&mut self, batch: Vec<Frontable>) -> Result<()> {
        self.staged_frontables.push_all(batch)
    }

    /// stages one group
    pub fn stage_group(&mut self, group: Group) -> Result<()> {
        self.staged_groups.push_all(vec![group])
    }

    /// Stages groups from `batch` until `MAX_GROUPS` are staged. Groups past that are
    /// dropped; returns how many were.
    pub fn stage_groups(&mut self, batch: Vec<Group>) -> usize {
        self.staged_groups.push_capped(batch)
    }

    /// stages one current fronter hash
    pub fn stage_current_fronter(&mut self, hash: u32) -> Result<()> {
        self.staged_fronters.push_all(vec![hash])
    }

    /// Stages a batch of current fronter hashes, all or nothing.
    pub fn stage_current_fronters(&mut self, hashes: Vec<u32>) -> Result<()> {
        self.staged_fronters.push_all(hashes)
    }

    /// number of staged frontables, groups and fronter hashes
    pub fn staged_counts(&self) -> (usize, usize, usize) {
        (
            self.staged_frontables.len(),
            self.staged_groups.len(),
            self.staged_fronters.len(),
        )
    }

    /// Replaces the live frontables with the staged ones.
    ///
    /// Hashes that were fronting before and still exist stay fronting, and every frontable's
    /// group bits are recomputed from the group member lists. Returns the new frontable count.
    pub fn flush_frontables(&mut self) -> Result<usize> {
        let staged = self.staged_frontables.take();
        let fronting: Vec<u32> = self.current_fronters().map(|f| f.hash).collect();

        self.clear_frontables();
        for f in staged {
            self.add_frontable(f)?;
        }
        for hash in fronting {
            self.add_current_fronter(hash)?;
        }
        self.relink_group_bits();

        let count = self.members.len() + self.custom_fronts.len();
        debug!(count, "flushed staged frontables");
        Ok(count)
    }

    /// Replaces the live groups with the staged ones. Parent links that don't point at a
    /// staged group are dropped.
    pub fn flush_groups(&mut self) -> Result<usize> {
        let staged = self.staged_groups.take();
        let count = staged.len();

        self.groups.deep_clear();
        for mut group in staged {
            if let Some(parent) = group.parent {
                if parent.0 >= count {
                    warn!(group = group.name(), parent = parent.0, "dropping out of range parent");
                    group.parent = None;
                }
            }
            self.groups.add(group)?;
        }
        self.relink_group_bits();

        debug!(count, "flushed staged groups");
        Ok(count)
    }

    /// Replaces the current fronters with the staged hashes. Unknown hashes are skipped.
    pub fn flush_current_fronters(&mut self) -> Result<usize> {
        let staged = self.staged_fronters.take();
        self.clear_current_fronters();
        for hash in staged {
            self.add_current_fronter(hash)?;
        }
        debug!(count = self.current_fronters.len(), "flushed staged current fronters");
        Ok(self.current_fronters.len())
    }

    /// recomputes every frontable's group bits from the group member lists
    fn relink_group_bits(&mut self) {
        let groups = &self.groups;
        for f in self.members.iter_mut().chain(self.custom_fronts.iter_mut()) {
            let mut bits = GroupBits::default();
            for (id, group) in groups.iter() {
                if group.members.contains(&f.hash) {
                    bits.insert(id.0);
                }
            }
            f.groups = bits;
        }
    }

    /// rebuilds the group member lists from the frontables' group bits
    fn relink_group_members(&mut self) -> Result<()> {
        for (_, group) in self.groups.iter_mut() {
            group.members.clear();
        }
        for f in self.members.iter().chain(self.custom_fronts.iter()) {
            for bit in f.groups.iter() {
                if let Some(group) = self.groups.get_mut(GroupId(bit)) {
                    group.add_member(f.hash)?;
                }
            }
        }
        Ok(())
    }
}
