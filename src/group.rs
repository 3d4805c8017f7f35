use tracing::error;

use crate::error::{CacheError, Result};
use crate::list::{List, Owned};
use crate::palette::PaletteColor;
use crate::string_tools::copy_smaller;

/// max length (in bytes) of a group name
pub const GROUP_NAME_LENGTH: usize = 32;
/// fixed capacity of a [`GroupCollection`]
pub const MAX_GROUPS: usize = 16;

/// Position of a group inside its [`GroupCollection`]. The same number is the group's bit in
/// a frontable's [`GroupBits`](crate::GroupBits) and, plus one, its persisted parent index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

/// A named, optionally nested bucket of frontables.
///
/// The group does not own its members. It keeps their hashes, which stay valid across
/// reloads of the frontable collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    /// display color
    pub color: PaletteColor,
    /// parent group, `None` for groups at the root
    pub parent: Option<GroupId>,
    /// hashes of the frontables in this group
    pub members: List<u32>,
}

impl Group {
    /// creates a group with an empty member list, truncating `name` to [`GROUP_NAME_LENGTH`]
    pub fn create(name: &str, color: PaletteColor, parent: Option<GroupId>) -> Group {
        Group {
            name: copy_smaller(name, GROUP_NAME_LENGTH),
            color,
            parent,
            members: List::new(),
        }
    }

    /// the (possibly truncated) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// adds a member hash unless it is already present
    pub fn add_member(&mut self, hash: u32) -> Result<()> {
        if !self.members.contains(&hash) {
            self.members.add(hash)?;
        }
        Ok(())
    }
}

impl Owned for Group {}

/// Fixed capacity arena of groups, addressed by [`GroupId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupCollection {
    groups: Vec<Group>,
}

impl GroupCollection {
    /// an empty collection
    pub fn new() -> Self {
        GroupCollection {
            groups: Vec::with_capacity(MAX_GROUPS),
        }
    }

    /// Appends `group` and returns its id.
    ///
    /// # Errors
    /// returns [`CacheError::CapacityExceeded`] once [`MAX_GROUPS`] groups are stored, the
    /// collection is left as it was
    pub fn add(&mut self, group: Group) -> Result<GroupId> {
        if self.groups.len() >= MAX_GROUPS {
            error!(group = group.name(), "cannot add any more groups, limit has been reached");
            return Err(CacheError::CapacityExceeded {
                what: "group collection",
                max: MAX_GROUPS,
            });
        }
        self.groups.push(group);
        Ok(GroupId(self.groups.len() - 1))
    }

    /// the group at `id`
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    /// the group at `id`, mutably
    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(id.0)
    }

    /// number of stored groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// true if no group is stored
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// iterates `(id, group)` pairs in collection order
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (GroupId, &mut Group)> {
        self.groups.iter_mut().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    /// groups directly below `parent`, or the root groups for `None`
    pub fn children_of(&self, parent: Option<GroupId>) -> impl Iterator<Item = (GroupId, &Group)> {
        self.iter().filter(move |(_, g)| g.parent == parent)
    }

    /// drops every group, returning how many were dropped
    pub fn deep_clear(&mut self) -> usize {
        let dropped = self.groups.len();
        self.groups.clear();
        dropped
    }
}
