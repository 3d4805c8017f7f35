//! The fixed 64 color display palette and the packed fronting/custom/color byte.
//!
//! Every palette color is an opaque ARGB8 value (`0b11rrggbb`), so index `i` of the
//! palette is the color `0xC0 | i`. Only these colors are representable by a frontable.

use serde::{Deserialize, Serialize};

/// number of colors in the palette
pub const NUM_COLORS: usize = 64;

const FRONTING_BIT: u8 = 0b1000_0000;
const CUSTOM_BIT: u8 = 0b0100_0000;
const COLOR_MASK: u8 = 0b0011_1111;

/// ARGB8 values of the palette, in palette index order.
const COLORS: [(u8, &str); NUM_COLORS] = [
    (0xC0, "Black"),
    (0xC1, "OxfordBlue"),
    (0xC2, "DukeBlue"),
    (0xC3, "Blue"),
    (0xC4, "DarkGreen"),
    (0xC5, "MidnightGreen"),
    (0xC6, "CobaltBlue"),
    (0xC7, "BlueMoon"),
    (0xC8, "IslamicGreen"),
    (0xC9, "JaegerGreen"),
    (0xCA, "TiffanyBlue"),
    (0xCB, "VividCerulean"),
    (0xCC, "Green"),
    (0xCD, "Malachite"),
    (0xCE, "MediumSpringGreen"),
    (0xCF, "Cyan"),
    (0xD0, "BulgarianRose"),
    (0xD1, "ImperialPurple"),
    (0xD2, "Indigo"),
    (0xD3, "ElectricUltramarine"),
    (0xD4, "ArmyGreen"),
    (0xD5, "DarkGray"),
    (0xD6, "Liberty"),
    (0xD7, "VeryLightBlue"),
    (0xD8, "KellyGreen"),
    (0xD9, "MayGreen"),
    (0xDA, "CadetBlue"),
    (0xDB, "PictonBlue"),
    (0xDC, "BrightGreen"),
    (0xDD, "ScreaminGreen"),
    (0xDE, "MediumAquamarine"),
    (0xDF, "ElectricBlue"),
    (0xE0, "DarkCandyAppleRed"),
    (0xE1, "JazzberryJam"),
    (0xE2, "Purple"),
    (0xE3, "VividViolet"),
    (0xE4, "WindsorTan"),
    (0xE5, "RoseVale"),
    (0xE6, "Purpureus"),
    (0xE7, "LavenderIndigo"),
    (0xE8, "Limerick"),
    (0xE9, "Brass"),
    (0xEA, "LightGray"),
    (0xEB, "BabyBlueEyes"),
    (0xEC, "SpringBud"),
    (0xED, "Inchworm"),
    (0xEE, "MintGreen"),
    (0xEF, "Celeste"),
    (0xF0, "Red"),
    (0xF1, "Folly"),
    (0xF2, "FashionMagenta"),
    (0xF3, "Magenta"),
    (0xF4, "Orange"),
    (0xF5, "SunsetOrange"),
    (0xF6, "BrilliantRose"),
    (0xF7, "ShockingPink"),
    (0xF8, "ChromeYellow"),
    (0xF9, "Rajah"),
    (0xFA, "Melon"),
    (0xFB, "RichBrilliantLavender"),
    (0xFC, "Yellow"),
    (0xFD, "Icterine"),
    (0xFE, "PastelYellow"),
    (0xFF, "White"),
];

/// A color from the fixed palette, stored as its 6-bit palette index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PaletteColor(u8);

impl PaletteColor {
    /// first palette entry, also the fallback for unknown colors
    pub const BLACK: PaletteColor = PaletteColor(0);
    /// `0xF0`
    pub const RED: PaletteColor = PaletteColor(48);
    /// `0xCC`
    pub const GREEN: PaletteColor = PaletteColor(12);
    /// `0xC3`
    pub const BLUE: PaletteColor = PaletteColor(3);
    /// `0xF8`
    pub const CHROME_YELLOW: PaletteColor = PaletteColor(56);
    /// `0xFF`
    pub const WHITE: PaletteColor = PaletteColor(63);

    /// Looks up an ARGB8 color by linear scan of the palette. A color that is not in the
    /// palette falls back to index 0 (black).
    pub fn from_argb(argb: u8) -> PaletteColor {
        COLORS
            .iter()
            .position(|&(c, _)| c == argb)
            .map(|i| PaletteColor(i as u8))
            .unwrap_or(PaletteColor::BLACK)
    }

    /// Returns the color at `index`, masking to the low six bits
    pub fn from_index(index: u8) -> PaletteColor {
        PaletteColor(index & COLOR_MASK)
    }

    /// palette index, always `< 64`
    pub fn index(self) -> u8 {
        self.0
    }

    /// ARGB8 value of this color
    pub fn argb(self) -> u8 {
        COLORS[self.0 as usize].0
    }

    /// the palette's name for this color
    pub fn name(self) -> &'static str {
        COLORS[self.0 as usize].1
    }

    /// iterates the whole palette in index order
    pub fn all() -> impl Iterator<Item = PaletteColor> {
        (0..NUM_COLORS as u8).map(PaletteColor)
    }
}

/// Packs fronting state, custom state and a color into one byte:
/// bit 7 = fronting, bit 6 = custom, bits 0-5 = palette index.
pub fn pack(fronting: bool, is_custom: bool, color: PaletteColor) -> u8 {
    let mut data = color.index();
    if fronting {
        data |= FRONTING_BIT;
    }
    if is_custom {
        data |= CUSTOM_BIT;
    }
    data
}

/// Inverse of [`pack`], returns `(fronting, is_custom, color)`
pub fn unpack(data: u8) -> (bool, bool, PaletteColor) {
    (
        data & FRONTING_BIT != 0,
        data & CUSTOM_BIT != 0,
        PaletteColor::from_index(data),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_every_opaque_argb8_color() {
        for (i, (argb, _)) in COLORS.iter().enumerate() {
            assert_eq!(*argb, 0xC0 | i as u8);
        }
    }

    #[test]
    fn pack_round_trips_every_color() {
        for color in PaletteColor::all() {
            for &(fronting, custom) in &[(false, false), (true, false), (false, true), (true, true)] {
                let packed = pack(fronting, custom, color);
                assert_eq!(unpack(packed), (fronting, custom, color));
            }
            assert_eq!(PaletteColor::from_argb(color.argb()), color);
        }
    }

    #[test]
    fn unknown_color_falls_back_to_first_entry() {
        // alpha bits other than 0b11 are not palette colors
        assert_eq!(PaletteColor::from_argb(0x3F), PaletteColor::BLACK);
        assert_eq!(pack(false, false, PaletteColor::from_argb(0x00)), 0);
    }
}
