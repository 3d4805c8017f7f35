use crate::list::Owned;
use crate::palette::{self, PaletteColor};
use crate::string_tools::copy_smaller;

/// max length (in bytes) of a frontable's name
pub const FRONTABLE_NAME_LENGTH: usize = 32;
/// max length (in bytes) of a member's pronouns
pub const FRONTABLE_PRONOUNS_LENGTH: usize = 16;

/// Group membership bitfield of a frontable. Bit `i` set means the frontable belongs to the
/// group at index `i` of the group collection, so it is only meaningful while the group
/// ordering is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct GroupBits(pub u32);

impl GroupBits {
    /// true if the bit for `group_index` is set
    pub fn contains(self, group_index: usize) -> bool {
        group_index < 32 && self.0 & (1 << group_index) != 0
    }

    /// sets the bit for `group_index`, indices past 31 are ignored
    pub fn insert(&mut self, group_index: usize) {
        if group_index < 32 {
            self.0 |= 1 << group_index;
        }
    }

    /// iterates the indices of all set bits, lowest first
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..32).filter(move |&i| self.contains(i))
    }

    /// true if no bit is set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// One member or custom front of a plural system.
///
/// The `hash` is assigned by the phone and is the only cross-reference key between
/// records. Custom fronts never carry pronouns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontable {
    /// stable unique id from the phone
    pub hash: u32,
    name: String,
    pronouns: String,
    color: PaletteColor,
    is_custom: bool,
    is_fronting: bool,
    /// groups this frontable belongs to
    pub groups: GroupBits,
}

impl Frontable {
    /// Creates a new frontable, not fronting and in no groups.
    ///
    /// `name` and `pronouns` are truncated to [`FRONTABLE_NAME_LENGTH`] and
    /// [`FRONTABLE_PRONOUNS_LENGTH`] bytes. Pronouns given for a custom front are dropped.
    pub fn create(
        hash: u32,
        name: &str,
        pronouns: Option<&str>,
        is_custom: bool,
        color: PaletteColor,
    ) -> Frontable {
        let pronouns = match pronouns {
            Some(p) if !is_custom => copy_smaller(p, FRONTABLE_PRONOUNS_LENGTH),
            _ => String::new(),
        };
        Frontable {
            hash,
            name: copy_smaller(name, FRONTABLE_NAME_LENGTH),
            pronouns,
            color,
            is_custom,
            is_fronting: false,
            groups: GroupBits::default(),
        }
    }

    /// Rebuilds a frontable from its packed fronting/custom/color byte
    pub fn from_packed(hash: u32, name: &str, pronouns: Option<&str>, packed: u8) -> Frontable {
        let (fronting, is_custom, color) = palette::unpack(packed);
        let mut f = Frontable::create(hash, name, pronouns, is_custom, color);
        f.is_fronting = fronting;
        f
    }

    /// the (possibly truncated) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// the (possibly truncated) pronouns, empty for custom fronts
    pub fn pronouns(&self) -> &str {
        &self.pronouns
    }

    /// overwrites pronouns, truncating to [`FRONTABLE_PRONOUNS_LENGTH`]. Ignored for custom fronts.
    pub fn set_pronouns(&mut self, pronouns: &str) {
        if !self.is_custom {
            self.pronouns = copy_smaller(pronouns, FRONTABLE_PRONOUNS_LENGTH);
        }
    }

    /// the record's palette color
    pub fn color(&self) -> PaletteColor {
        self.color
    }

    /// true for custom fronts, false for members
    pub fn is_custom(&self) -> bool {
        self.is_custom
    }

    /// true while this frontable is in the current fronters set
    pub fn is_fronting(&self) -> bool {
        self.is_fronting
    }

    /// sets the fronting flag, a no-op if it already matches
    pub fn set_is_fronting(&mut self, fronting: bool) {
        if self.is_fronting != fronting {
            self.is_fronting = fronting;
        }
    }

    /// the historical packed byte, see [`palette::pack`]
    pub fn packed(&self) -> u8 {
        palette::pack(self.is_fronting, self.is_custom, self.color)
    }
}

impl Owned for Frontable {}
