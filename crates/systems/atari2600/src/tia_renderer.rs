//! TIA pixel composition
//!
//! Each visible dot the TIA evaluates which objects cover the pixel
//! ([`PixelObjects`]), lets the priority logic pick one color register, and
//! turns that register into RGB through a [`ColorResolver`].
//!
//! # Priority
//!
//! ```text
//! CTRLPF bit 2 clear:  P0/M0 > P1/M1 > BL/PF > background
//! CTRLPF bit 2 set:    BL/PF > P0/M0 > P1/M1 > background
//! ```

use std::fmt;

use crate::tia_graphics::Color;

/// Maps a color register to display RGB.
pub trait ColorResolver: fmt::Debug + Send + Sync {
    fn resolve(&self, color: Color) -> [u8; 3];
}

/// NTSC palette, 16 hues x 8 luminances.
#[derive(Debug, Default, Clone, Copy)]
pub struct NtscPalette;

#[rustfmt::skip]
const NTSC_PALETTE: [u32; 128] = [
    0x000000, 0x404040, 0x6C6C6C, 0x909090, 0xB0B0B0, 0xC8C8C8, 0xDCDCDC, 0xECECEC,
    0x444400, 0x646410, 0x848424, 0xA0A034, 0xB8B840, 0xD0D050, 0xE8E85C, 0xFCFC68,
    0x702800, 0x844414, 0x985C28, 0xAC783C, 0xBC8C4C, 0xCCA05C, 0xDCB468, 0xECC878,
    0x841800, 0x983418, 0xAC5030, 0xC06848, 0xD0805C, 0xE09470, 0xECA880, 0xFCBC94,
    0x880000, 0x9C2020, 0xB03C3C, 0xC05858, 0xD07070, 0xE08888, 0xECA0A0, 0xFCB4B4,
    0x78005C, 0x8C2074, 0xA03C88, 0xB0589C, 0xC070B0, 0xD084C0, 0xDC9CD0, 0xECB0E0,
    0x480078, 0x602090, 0x783CA4, 0x8C58B8, 0xA070CC, 0xB484DC, 0xC49CEC, 0xD4B0FC,
    0x140084, 0x302098, 0x4C3CAC, 0x6858C0, 0x7C70D0, 0x9488E0, 0xA8A0EC, 0xBCB4FC,
    0x000088, 0x1C209C, 0x3840B0, 0x505CC0, 0x6874D0, 0x7C8CE0, 0x90A4EC, 0xA4B8FC,
    0x00187C, 0x1C3890, 0x3854A8, 0x5070BC, 0x6888CC, 0x7C9CDC, 0x90B4EC, 0xA4C8FC,
    0x002C5C, 0x1C4C78, 0x386890, 0x5084AC, 0x689CC0, 0x7CB4D4, 0x90CCE8, 0xA4E0FC,
    0x003C2C, 0x1C5C48, 0x387C64, 0x509C80, 0x68B494, 0x7CD0AC, 0x90E4C0, 0xA4FCD4,
    0x003C00, 0x205C20, 0x407C40, 0x5C9C5C, 0x74B474, 0x8CD08C, 0xA4E4A4, 0xB8FCB8,
    0x143800, 0x345C1C, 0x507C38, 0x6C9850, 0x84B468, 0x9CCC7C, 0xB4E490, 0xC8FCA4,
    0x2C3000, 0x4C501C, 0x687034, 0x848C4C, 0x9CA864, 0xB4C078, 0xCCD488, 0xE0EC9C,
    0x442800, 0x644818, 0x846830, 0xA08444, 0xB89C58, 0xD0B46C, 0xE8CC7C, 0xFCE08C,
];

impl ColorResolver for NtscPalette {
    fn resolve(&self, color: Color) -> [u8; 3] {
        let rgb = NTSC_PALETTE[color.index() & 0x7F];
        [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]
    }
}

/// Objects covering one pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelObjects {
    pub player0: bool,
    pub player1: bool,
    pub missile0: bool,
    pub missile1: bool,
    pub ball: bool,
    pub playfield: bool,
}

/// The four color registers plus the CTRLPF bits that affect selection
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub player0: Color,
    pub player1: Color,
    pub playfield: Color,
    pub background: Color,
    pub priority: bool,
    pub score_mode: bool,
}

impl Palette {
    /// Pick the winning color register for pixel `x`
    pub fn select(&self, x: u8, objects: PixelObjects) -> Color {
        let p0 = objects.player0 || objects.missile0;
        let p1 = objects.player1 || objects.missile1;
        let field = objects.ball || objects.playfield;

        // Score mode colors the playfield (not the ball) by screen half
        let field_color = if self.score_mode && objects.playfield && !objects.ball {
            if x < 80 {
                self.player0
            } else {
                self.player1
            }
        } else {
            self.playfield
        };

        if self.priority && field {
            return field_color;
        }
        if p0 {
            self.player0
        } else if p1 {
            self.player1
        } else if field {
            field_color
        } else {
            self.background
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(priority: bool) -> Palette {
        Palette {
            player0: Color::from_register(0x44),
            player1: Color::from_register(0x86),
            playfield: Color::from_register(0x28),
            background: Color::from_register(0x00),
            priority,
            score_mode: false,
        }
    }

    #[test]
    fn test_ntsc_palette_endpoints() {
        let pal = NtscPalette;
        assert_eq!(pal.resolve(Color::from_register(0x00)), [0, 0, 0]);
        assert_eq!(pal.resolve(Color::from_register(0x0E)), [0xEC, 0xEC, 0xEC]);
        assert_eq!(pal.resolve(Color::from_register(0x40)), [0x88, 0x00, 0x00]);
    }

    #[test]
    fn test_normal_priority_player_over_playfield() {
        let objects = PixelObjects {
            player0: true,
            playfield: true,
            ..Default::default()
        };
        assert_eq!(palette(false).select(10, objects), palette(false).player0);
    }

    #[test]
    fn test_playfield_priority_over_players() {
        let objects = PixelObjects {
            player0: true,
            playfield: true,
            ..Default::default()
        };
        assert_eq!(palette(true).select(10, objects), palette(true).playfield);

        let ball_only = PixelObjects {
            ball: true,
            missile1: true,
            ..Default::default()
        };
        assert_eq!(palette(true).select(10, ball_only), palette(true).playfield);
    }

    #[test]
    fn test_player0_beats_player1() {
        let objects = PixelObjects {
            missile0: true,
            player1: true,
            ..Default::default()
        };
        assert_eq!(palette(false).select(50, objects), palette(false).player0);
        assert_eq!(palette(true).select(50, objects), palette(true).player0);
    }

    #[test]
    fn test_background_when_empty() {
        let pal = palette(false);
        assert_eq!(pal.select(0, PixelObjects::default()), pal.background);
    }

    #[test]
    fn test_score_mode_uses_player_colors_by_half() {
        let mut pal = palette(false);
        pal.score_mode = true;
        let pf = PixelObjects {
            playfield: true,
            ..Default::default()
        };
        assert_eq!(pal.select(79, pf), pal.player0);
        assert_eq!(pal.select(80, pf), pal.player1);

        let ball = PixelObjects {
            ball: true,
            playfield: true,
            ..Default::default()
        };
        assert_eq!(pal.select(120, ball), pal.playfield);
    }
}
