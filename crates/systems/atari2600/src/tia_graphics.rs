//! TIA graphics primitives: color registers, player sprite expansion and the
//! playfield register.

use serde::{Deserialize, Serialize};
use vcs_core::logging::{log, LogCategory, LogLevel};

/// Width of the window a player's copies are laid out in
pub const PLAYER_WINDOW: usize = 80;

/// Number of 4-pixel playfield cells in one half of the line
pub const PLAYFIELD_CELLS: usize = 20;

/// One color register: luminance in bits 1-3, hue in bits 4-7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub luminance: u8,
    pub hue: u8,
}

impl Color {
    pub fn from_register(value: u8) -> Self {
        Self {
            luminance: (value & 0b0000_1110) >> 1,
            hue: (value & 0b1111_0000) >> 4,
        }
    }

    /// Palette index 0-127 (hue major)
    pub fn index(self) -> usize {
        self.hue as usize * 8 + self.luminance as usize
    }
}

/// NUSIZ player number/size modes (bits 0-2)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerSize {
    #[default]
    One,
    TwoClose,
    TwoMedium,
    ThreeClose,
    TwoWide,
    Double,
    ThreeMedium,
    Quad,
}

impl PlayerSize {
    /// Decode a size code. Codes outside 0-7 fall back to a single copy.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => PlayerSize::One,
            1 => PlayerSize::TwoClose,
            2 => PlayerSize::TwoMedium,
            3 => PlayerSize::ThreeClose,
            4 => PlayerSize::TwoWide,
            5 => PlayerSize::Double,
            6 => PlayerSize::ThreeMedium,
            7 => PlayerSize::Quad,
            _ => {
                log(LogCategory::Tia, LogLevel::Warn, || {
                    format!("TIA: invalid player size code {}, using single copy", code)
                });
                PlayerSize::One
            }
        }
    }

    /// Start of each copy within the 80-slot window
    pub fn copy_offsets(self) -> &'static [usize] {
        match self {
            PlayerSize::One | PlayerSize::Double | PlayerSize::Quad => &[0],
            PlayerSize::TwoClose => &[0, 16],
            PlayerSize::TwoMedium => &[0, 32],
            PlayerSize::ThreeClose => &[0, 16, 32],
            PlayerSize::TwoWide => &[0, 64],
            PlayerSize::ThreeMedium => &[0, 32, 64],
        }
    }

    /// Screen pixels per pattern bit
    pub fn scale(self) -> usize {
        match self {
            PlayerSize::Double => 2,
            PlayerSize::Quad => 4,
            _ => 1,
        }
    }

    /// Offset of a missile locked to a player of this size
    pub fn missile_lock_offset(self) -> u8 {
        match self {
            PlayerSize::Double => 6,
            PlayerSize::Quad => 10,
            _ => 3,
        }
    }
}

/// A player's 8-pixel pattern and its expansion across the 80-slot window.
///
/// The expansion is recomputed on every change to pattern, reflect or size,
/// so drawing a pixel is a single lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PatternState", into = "PatternState")]
pub struct PlayerGraphics {
    pattern: [bool; 8],
    reflect: bool,
    size: PlayerSize,
    expanded: [bool; PLAYER_WINDOW],
}

#[derive(Serialize, Deserialize)]
struct PatternState {
    pattern: [bool; 8],
    reflect: bool,
    size: PlayerSize,
}

impl From<PatternState> for PlayerGraphics {
    fn from(state: PatternState) -> Self {
        let mut graphics = Self {
            pattern: state.pattern,
            reflect: state.reflect,
            size: state.size,
            expanded: [false; PLAYER_WINDOW],
        };
        graphics.expand();
        graphics
    }
}

impl From<PlayerGraphics> for PatternState {
    fn from(graphics: PlayerGraphics) -> Self {
        Self {
            pattern: graphics.pattern,
            reflect: graphics.reflect,
            size: graphics.size,
        }
    }
}

impl Default for PlayerGraphics {
    fn default() -> Self {
        Self {
            pattern: [false; 8],
            reflect: false,
            size: PlayerSize::One,
            expanded: [false; PLAYER_WINDOW],
        }
    }
}

impl PlayerGraphics {
    /// Store a GRPn value. Bit 7 is the leftmost pixel, bit 0 the last.
    pub fn set_pattern(&mut self, value: u8) {
        for (i, px) in self.pattern.iter_mut().enumerate() {
            *px = value & (0x80 >> i) != 0;
        }
        self.expand();
    }

    pub fn set_reflect(&mut self, reflect: bool) {
        self.reflect = reflect;
        self.expand();
    }

    pub fn set_size(&mut self, size: PlayerSize) {
        self.size = size;
        self.expand();
    }

    pub fn pattern(&self) -> &[bool; 8] {
        &self.pattern
    }

    pub fn reflect(&self) -> bool {
        self.reflect
    }

    pub fn size(&self) -> PlayerSize {
        self.size
    }

    pub fn expanded(&self) -> &[bool; PLAYER_WINDOW] {
        &self.expanded
    }

    /// Slot `offset` pixels right of the player's position
    #[inline]
    pub fn slot(&self, offset: usize) -> bool {
        offset < PLAYER_WINDOW && self.expanded[offset]
    }

    fn expand(&mut self) {
        self.expanded = [false; PLAYER_WINDOW];

        let mut pixels = self.pattern;
        if self.reflect {
            pixels.reverse();
        }

        let scale = self.size.scale();
        for &start in self.size.copy_offsets() {
            for (i, &on) in pixels.iter().enumerate() {
                let at = start + i * scale;
                self.expanded[at..at + scale].fill(on);
            }
        }
    }
}

/// The 20-cell playfield. Each of PF0, PF1 and PF2 writes its own cells with
/// its own bit order:
///
/// ```text
/// cell   0 1 2 3 | 4 5 6 7 8 9 10 11 | 12 13 14 15 16 17 18 19
/// reg    PF0     | PF1               | PF2
/// bit    4 5 6 7 | 7 6 5 4 3 2 1  0  | 0  1  2  3  4  5  6  7
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playfield {
    cells: [bool; PLAYFIELD_CELLS],
    pub reflect: bool,
    pub score_mode: bool,
    pub priority: bool,
}

impl Playfield {
    /// PF0: bits 4-7 into cells 0-3
    pub fn write_pf0(&mut self, value: u8) {
        for (i, cell) in self.cells[0..4].iter_mut().enumerate() {
            *cell = value & (0x10 << i) != 0;
        }
    }

    /// PF1: bits 7-0 into cells 4-11
    pub fn write_pf1(&mut self, value: u8) {
        for (i, cell) in self.cells[4..12].iter_mut().enumerate() {
            *cell = value & (0x80 >> i) != 0;
        }
    }

    /// PF2: bits 0-7 into cells 12-19
    pub fn write_pf2(&mut self, value: u8) {
        for (i, cell) in self.cells[12..20].iter_mut().enumerate() {
            *cell = value & (0x01 << i) != 0;
        }
    }

    pub fn cells(&self) -> &[bool; PLAYFIELD_CELLS] {
        &self.cells
    }

    /// Whether the playfield covers visible pixel `x` (0-159)
    #[inline]
    pub fn covers(&self, x: u8) -> bool {
        let cell = x as usize / 4;
        let cell = if cell < PLAYFIELD_CELLS {
            cell
        } else if self.reflect {
            2 * PLAYFIELD_CELLS - 1 - cell
        } else {
            cell - PLAYFIELD_CELLS
        };
        self.cells.get(cell).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_decode() {
        let c = Color::from_register(0x4E);
        assert_eq!(c.hue, 4);
        assert_eq!(c.luminance, 7);

        // Bit 0 is not connected
        assert_eq!(Color::from_register(0x01), Color::default());
        assert_eq!(Color::from_register(0xFE).index(), 127);
    }

    #[test]
    fn test_pattern_reads_msb_first() {
        let mut g = PlayerGraphics::default();
        g.set_pattern(0b1100_0001);
        assert_eq!(
            g.pattern(),
            &[true, true, false, false, false, false, false, true]
        );
        assert_eq!(&g.expanded()[..8], g.pattern());
        assert!(g.expanded()[8..].iter().all(|&on| !on));
    }

    #[test]
    fn test_reflect_reverses_expansion() {
        let mut g = PlayerGraphics::default();
        g.set_pattern(0b1110_0000);
        g.set_reflect(true);
        assert_eq!(
            &g.expanded()[..8],
            &[false, false, false, false, false, true, true, true]
        );

        g.set_reflect(false);
        assert_eq!(
            &g.expanded()[..8],
            &[true, true, true, false, false, false, false, false]
        );
    }

    #[test]
    fn test_double_width_expansion() {
        let mut g = PlayerGraphics::default();
        g.set_size(PlayerSize::from_code(5));
        g.set_pattern(0xFF);
        assert!(g.expanded()[..16].iter().all(|&on| on));
        assert!(g.expanded()[16..].iter().all(|&on| !on));
    }

    #[test]
    fn test_quad_width_doubles_each_bit_four_times() {
        let mut g = PlayerGraphics::default();
        g.set_pattern(0b1000_0001);
        g.set_size(PlayerSize::Quad);
        let on: Vec<usize> = (0..PLAYER_WINDOW).filter(|&i| g.slot(i)).collect();
        assert_eq!(on, vec![0, 1, 2, 3, 28, 29, 30, 31]);
    }

    #[test]
    fn test_copy_layouts() {
        let expected: [(u8, &[usize]); 5] = [
            (1, &[0, 16]),
            (2, &[0, 32]),
            (3, &[0, 16, 32]),
            (4, &[0, 64]),
            (6, &[0, 32, 64]),
        ];
        for (code, starts) in expected {
            let mut g = PlayerGraphics::default();
            g.set_pattern(0x80);
            g.set_size(PlayerSize::from_code(code));
            let on: Vec<usize> = (0..PLAYER_WINDOW).filter(|&i| g.slot(i)).collect();
            assert_eq!(on, starts, "size code {}", code);
        }
    }

    #[test]
    fn test_invalid_size_code_falls_back_to_single_copy() {
        assert_eq!(PlayerSize::from_code(9), PlayerSize::One);
    }

    #[test]
    fn test_missile_lock_offsets() {
        assert_eq!(PlayerSize::One.missile_lock_offset(), 3);
        assert_eq!(PlayerSize::ThreeMedium.missile_lock_offset(), 3);
        assert_eq!(PlayerSize::Double.missile_lock_offset(), 6);
        assert_eq!(PlayerSize::Quad.missile_lock_offset(), 10);
    }

    #[test]
    fn test_serde_recomputes_expansion() {
        let mut g = PlayerGraphics::default();
        g.set_pattern(0xA5);
        g.set_size(PlayerSize::TwoClose);

        let json = serde_json::to_string(&g).unwrap();
        let back: PlayerGraphics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn test_playfield_bit_mapping() {
        let mut pf = Playfield::default();
        pf.write_pf0(0b0001_0000);
        pf.write_pf1(0b1000_0000);
        pf.write_pf2(0b0000_0001);

        let on: Vec<usize> = (0..PLAYFIELD_CELLS).filter(|&i| pf.cells()[i]).collect();
        assert_eq!(on, vec![0, 4, 12]);

        pf.write_pf0(0b1000_0000);
        pf.write_pf1(0b0000_0001);
        pf.write_pf2(0b1000_0000);
        let on: Vec<usize> = (0..PLAYFIELD_CELLS).filter(|&i| pf.cells()[i]).collect();
        assert_eq!(on, vec![3, 11, 19]);
    }

    #[test]
    fn test_playfield_low_pf0_nibble_ignored() {
        let mut pf = Playfield::default();
        pf.write_pf0(0x0F);
        assert!(pf.cells().iter().all(|&c| !c));
    }

    #[test]
    fn test_playfield_writes_are_idempotent() {
        let mut pf = Playfield::default();
        pf.write_pf0(0xA0);
        pf.write_pf1(0x5A);
        pf.write_pf2(0xC3);
        let first = *pf.cells();

        pf.write_pf0(0xA0);
        pf.write_pf1(0x5A);
        pf.write_pf2(0xC3);
        assert_eq!(*pf.cells(), first);
    }

    #[test]
    fn test_playfield_repeat_and_mirror() {
        let mut pf = Playfield::default();
        pf.write_pf0(0b0001_0000); // cell 0 only

        assert!(pf.covers(0) && pf.covers(3));
        assert!(!pf.covers(4));

        // Repeated: right half starts over at cell 0
        assert!(pf.covers(80) && pf.covers(83));
        assert!(!pf.covers(156));

        // Mirrored: cell 0 lands at the far right
        pf.reflect = true;
        assert!(!pf.covers(80));
        assert!(pf.covers(156) && pf.covers(159));
    }
}
