//! TIA (Television Interface Adapter) - video chip for the Atari 2600
//!
//! The TIA has no framebuffer of its own: it generates the picture one dot at
//! a time while the CPU races the beam. This module keeps the chip's register
//! file and its dot/scanline counters, and on every visible dot composes one
//! pixel into the frame buffer.
//!
//! # Timing
//!
//! - 228 dots per scanline: dots 0-67 are horizontal blank, dots 68-227 draw
//!   pixels 0-159.
//! - 262 scanlines per frame. Wrapping scanline 261 to 0 completes a frame.
//! - Nothing is drawn while VSYNC or VBLANK is asserted.
//!
//! # Registers
//!
//! Writes decode 6 address bits (0x00-0x2C are defined), reads decode only 4
//! (collision latches 0x00-0x07, input ports 0x08-0x0D).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vcs_core::logging::{log, LogCategory, LogLevel};
use vcs_core::types::Frame;

use crate::tia_graphics::{Color, PlayerGraphics, PlayerSize, Playfield};
use crate::tia_renderer::{ColorResolver, NtscPalette, Palette, PixelObjects};

pub const DOTS_PER_SCANLINE: u16 = 228;
pub const HBLANK_DOTS: u16 = 68;
pub const SCANLINES_PER_FRAME: u16 = 262;
pub const VISIBLE_WIDTH: u32 = 160;
pub const VISIBLE_HEIGHT: u32 = 192;

/// Position latched by a strobe issued during horizontal blank
const PLAYER_BLANK_RESET: u8 = 3;
const MISSILE_BLANK_RESET: u8 = 2;

/// What a single [`Tia::clock`] crossed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockEvent {
    /// The dot counter wrapped to 0
    pub new_scanline: bool,
    /// The scanline counter wrapped to 0
    pub frame_complete: bool,
}

/// Offset of `x` from an object at `position`, wrapping around the line
#[inline]
fn offset_from(x: u8, position: u8) -> usize {
    (x as i16 - position as i16).rem_euclid(VISIBLE_WIDTH as i16) as usize
}

#[inline]
fn apply_motion(position: u8, motion: i8) -> u8 {
    (position as i16 + motion as i16).rem_euclid(VISIBLE_WIDTH as i16) as u8
}

/// High nibble of an HMxx write as a signed value (-8..=7)
#[inline]
fn motion_nibble(val: u8) -> i8 {
    (val as i8) >> 4
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Player {
    new_pattern: u8,
    old_pattern: u8,
    vertical_delay: bool,
    position: u8,
    motion: i8,
    graphics: PlayerGraphics,
}

impl Player {
    /// Re-expand from whichever copy VDELPn selects
    fn refresh(&mut self) {
        let pattern = if self.vertical_delay {
            self.old_pattern
        } else {
            self.new_pattern
        };
        self.graphics.set_pattern(pattern);
    }

    #[inline]
    fn covers(&self, x: u8) -> bool {
        self.graphics.slot(offset_from(x, self.position))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Missile {
    enabled: bool,
    size: u8,
    position: u8,
    motion: i8,
    locked: bool,
}

impl Missile {
    #[inline]
    fn covers(&self, x: u8) -> bool {
        self.enabled && !self.locked && offset_from(x, self.position) < (1usize << self.size)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ball {
    enabled_new: bool,
    enabled_old: bool,
    vertical_delay: bool,
    size: u8,
    position: u8,
    motion: i8,
}

impl Ball {
    #[inline]
    fn covers(&self, x: u8) -> bool {
        let enabled = if self.vertical_delay {
            self.enabled_old
        } else {
            self.enabled_new
        };
        enabled && offset_from(x, self.position) < (1usize << self.size)
    }
}

/// Collision latches.
///
/// `missile[n]` columns: P0, P1, BL, PF, other missile.
/// `player[n]` columns: BL, PF, other player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collisions {
    missile: [[bool; 5]; 2],
    player: [[bool; 3]; 2],
    ball_playfield: bool,
}

impl Collisions {
    fn record(&mut self, o: &PixelObjects) {
        let players = [o.player0, o.player1];
        let missiles = [o.missile0, o.missile1];

        for n in 0..2 {
            if missiles[n] {
                let row = &mut self.missile[n];
                row[0] |= o.player0;
                row[1] |= o.player1;
                row[2] |= o.ball;
                row[3] |= o.playfield;
                row[4] |= missiles[1 - n];
            }
            if players[n] {
                let row = &mut self.player[n];
                row[0] |= o.ball;
                row[1] |= o.playfield;
                row[2] |= players[1 - n];
            }
        }
        self.ball_playfield |= o.ball && o.playfield;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    /// CXxxx read value (0x00-0x07), latches on D7 and D6
    fn read(&self, reg: u8) -> u8 {
        let (d7, d6) = match reg {
            0x00 => (self.missile[0][1], self.missile[0][0]), // CXM0P
            0x01 => (self.missile[1][0], self.missile[1][1]), // CXM1P
            0x02 => (self.player[0][1], self.player[0][0]),   // CXP0FB
            0x03 => (self.player[1][1], self.player[1][0]),   // CXP1FB
            0x04 => (self.missile[0][3], self.missile[0][2]), // CXM0FB
            0x05 => (self.missile[1][3], self.missile[1][2]), // CXM1FB
            0x06 => (self.ball_playfield, false),             // CXBLPF
            0x07 => (self.player[0][2], self.missile[0][4]),  // CXPPMM
            _ => (false, false),
        };
        (d7 as u8) << 7 | (d6 as u8) << 6
    }
}

/// Audio registers. Stored only; no sound is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRegisters {
    pub control: [u8; 2],
    pub frequency: [u8; 2],
    pub volume: [u8; 2],
}

fn blank_frame() -> Frame {
    Frame::new(VISIBLE_WIDTH, VISIBLE_HEIGHT)
}

fn default_resolver() -> Arc<dyn ColorResolver> {
    Arc::new(NtscPalette)
}

/// TIA chip state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tia {
    vsync: bool,
    vblank: bool,
    /// WSYNC: CPU halted until the next scanline
    wait: bool,

    playfield: Playfield,
    players: [Player; 2],
    missiles: [Missile; 2],
    ball: Ball,
    collisions: Collisions,

    colup0: Color,
    colup1: Color,
    colupf: Color,
    colubk: Color,

    audio: AudioRegisters,

    dot: u16,
    scanline: u16,
    frames: u64,
    first_visible_scanline: u16,

    #[serde(skip, default = "blank_frame")]
    frame: Frame,
    #[serde(skip, default = "default_resolver")]
    resolver: Arc<dyn ColorResolver>,
}

impl Default for Tia {
    fn default() -> Self {
        Self::new()
    }
}

impl Tia {
    pub fn new() -> Self {
        Self {
            vsync: false,
            vblank: false,
            wait: false,
            playfield: Playfield::default(),
            players: Default::default(),
            missiles: Default::default(),
            ball: Ball::default(),
            collisions: Collisions::default(),
            colup0: Color::default(),
            colup1: Color::default(),
            colupf: Color::default(),
            colubk: Color::default(),
            audio: AudioRegisters::default(),
            dot: 0,
            scanline: 0,
            frames: 0,
            first_visible_scanline: 0,
            frame: blank_frame(),
            resolver: default_resolver(),
        }
    }

    /// Power-on state. The installed color resolver and the visible-window
    /// setting survive.
    pub fn reset(&mut self) {
        let resolver = Arc::clone(&self.resolver);
        let first_visible_scanline = self.first_visible_scanline;
        *self = Self::new();
        self.resolver = resolver;
        self.first_visible_scanline = first_visible_scanline;
    }

    pub fn set_color_resolver(&mut self, resolver: Arc<dyn ColorResolver>) {
        self.resolver = resolver;
    }

    pub fn color_resolver(&self) -> &Arc<dyn ColorResolver> {
        &self.resolver
    }

    /// Scanline drawn into frame row 0
    pub fn set_first_visible_scanline(&mut self, scanline: u16) {
        self.first_visible_scanline = scanline;
    }

    pub fn first_visible_scanline(&self) -> u16 {
        self.first_visible_scanline
    }

    /// Position latched by a RESxx strobe at the current dot
    fn strobe_position(&self, blank_value: u8) -> u8 {
        if self.dot < HBLANK_DOTS {
            blank_value
        } else {
            (self.dot % VISIBLE_WIDTH as u16) as u8
        }
    }

    fn missile_lock_position(&self, n: usize) -> u8 {
        let player = &self.players[n];
        let offset = player.graphics.size().missile_lock_offset();
        (player.position + offset) % VISIBLE_WIDTH as u8
    }

    /// Write to a TIA register (6-bit address)
    pub fn write(&mut self, addr: u8, val: u8) {
        let reg = addr & 0x3F;
        match reg {
            0x00 => self.vsync = (val & 0x02) != 0,
            0x01 => self.vblank = (val & 0x02) != 0,
            0x02 => self.wait = true, // WSYNC
            0x03 => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("TIA: RSYNC at dot {} ignored", self.dot)
                });
            }

            // NUSIZ0/1: player size in bits 0-2, missile size in bits 4-5
            0x04 | 0x05 => {
                let n = (reg & 0x01) as usize;
                self.players[n]
                    .graphics
                    .set_size(PlayerSize::from_code(val & 0x07));
                self.missiles[n].size = (val >> 4) & 0x03;
            }

            0x06 => self.colup0 = Color::from_register(val),
            0x07 => self.colup1 = Color::from_register(val),
            0x08 => self.colupf = Color::from_register(val),
            0x09 => self.colubk = Color::from_register(val),

            0x0A => {
                self.playfield.reflect = (val & 0x01) != 0;
                self.playfield.score_mode = (val & 0x02) != 0;
                self.playfield.priority = (val & 0x04) != 0;
                self.ball.size = (val >> 4) & 0x03;
            }

            // REFP0/1
            0x0B | 0x0C => {
                let n = (reg - 0x0B) as usize;
                self.players[n].graphics.set_reflect((val & 0x08) != 0);
            }

            0x0D => self.playfield.write_pf0(val),
            0x0E => self.playfield.write_pf1(val),
            0x0F => self.playfield.write_pf2(val),

            // Position strobes
            0x10 | 0x11 => {
                let n = (reg - 0x10) as usize;
                self.players[n].position = self.strobe_position(PLAYER_BLANK_RESET);
            }
            0x12 | 0x13 => {
                let n = (reg - 0x12) as usize;
                self.missiles[n].position = self.strobe_position(MISSILE_BLANK_RESET);
            }
            0x14 => self.ball.position = self.strobe_position(MISSILE_BLANK_RESET),

            0x15..=0x1A => self.write_audio(reg, val),

            // GRP0 also shifts player 1's delayed copy
            0x1B => {
                self.players[0].new_pattern = val;
                self.players[1].old_pattern = self.players[1].new_pattern;
                self.players[0].refresh();
                self.players[1].refresh();
            }
            // GRP1 also shifts player 0's and the ball's delayed copies
            0x1C => {
                self.players[1].new_pattern = val;
                self.players[0].old_pattern = self.players[0].new_pattern;
                self.ball.enabled_old = self.ball.enabled_new;
                self.players[0].refresh();
                self.players[1].refresh();
            }

            0x1D => self.missiles[0].enabled = (val & 0x02) != 0,
            0x1E => self.missiles[1].enabled = (val & 0x02) != 0,
            0x1F => self.ball.enabled_new = (val & 0x02) != 0,

            0x20 => self.players[0].motion = motion_nibble(val),
            0x21 => self.players[1].motion = motion_nibble(val),
            0x22 => self.missiles[0].motion = motion_nibble(val),
            0x23 => self.missiles[1].motion = motion_nibble(val),
            0x24 => self.ball.motion = motion_nibble(val),

            // VDELP0/1
            0x25 | 0x26 => {
                let n = (reg - 0x25) as usize;
                self.players[n].vertical_delay = (val & 0x01) != 0;
                self.players[n].refresh();
            }
            0x27 => self.ball.vertical_delay = (val & 0x01) != 0,

            // RESMP0/1
            0x28 | 0x29 => {
                let n = (reg - 0x28) as usize;
                let lock = (val & 0x02) != 0;
                if self.missiles[n].locked && !lock {
                    self.missiles[n].position = self.missile_lock_position(n);
                }
                self.missiles[n].locked = lock;
            }

            0x2A => self.hmove(),
            0x2B => {
                for player in &mut self.players {
                    player.motion = 0;
                }
                for missile in &mut self.missiles {
                    missile.motion = 0;
                }
                self.ball.motion = 0;
            }
            0x2C => self.collisions.clear(),

            _ => {
                log(LogCategory::Tia, LogLevel::Debug, || {
                    format!("TIA: write to undefined register 0x{:02X} = 0x{:02X}", addr, val)
                });
            }
        }
    }

    fn write_audio(&mut self, reg: u8, val: u8) {
        let n = ((reg - 0x15) & 0x01) as usize;
        match reg {
            0x15 | 0x16 => self.audio.control[n] = val & 0x0F,
            0x17 | 0x18 => self.audio.frequency[n] = val & 0x1F,
            _ => self.audio.volume[n] = val & 0x0F,
        }
        log(LogCategory::Stubs, LogLevel::Trace, || {
            format!("TIA: audio register 0x{:02X} = 0x{:02X} (no sound)", reg, val)
        });
    }

    /// HMOVE: apply each object's motion once.
    ///
    /// The extra motion clocks the real chip produces when HMOVE lands
    /// mid-scanline are not modeled.
    fn hmove(&mut self) {
        for player in &mut self.players {
            player.position = apply_motion(player.position, player.motion);
        }
        for missile in &mut self.missiles {
            missile.position = apply_motion(missile.position, missile.motion);
        }
        self.ball.position = apply_motion(self.ball.position, self.ball.motion);
    }

    /// Read a TIA register (4-bit address)
    pub fn read(&self, addr: u8) -> u8 {
        match addr & 0x0F {
            reg @ 0x00..=0x07 => self.collisions.read(reg),
            reg @ 0x08..=0x0D => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("TIA: input port INPT{} read, no controller attached", reg - 0x08)
                });
                0
            }
            reg => {
                log(LogCategory::Tia, LogLevel::Debug, || {
                    format!("TIA: read from undefined register 0x{:02X}", reg)
                });
                0
            }
        }
    }

    /// Whether the CPU is halted by WSYNC
    pub fn is_waiting(&self) -> bool {
        self.wait
    }

    pub fn release_wait(&mut self) {
        self.wait = false;
    }

    /// Advance one dot, drawing a pixel when the beam is visible.
    pub fn clock(&mut self) -> ClockEvent {
        if self.dot >= HBLANK_DOTS && !self.vsync && !self.vblank {
            self.draw_pixel((self.dot - HBLANK_DOTS) as u8);
        }

        let mut event = ClockEvent::default();
        self.dot += 1;
        if self.dot >= DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            event.new_scanline = true;

            if self.scanline >= SCANLINES_PER_FRAME {
                self.scanline = 0;
                self.frames += 1;
                event.frame_complete = true;
            }
        }
        event
    }

    fn draw_pixel(&mut self, x: u8) {
        let objects = PixelObjects {
            player0: self.players[0].covers(x),
            player1: self.players[1].covers(x),
            missile0: self.missiles[0].covers(x),
            missile1: self.missiles[1].covers(x),
            ball: self.ball.covers(x),
            playfield: self.playfield.covers(x),
        };
        self.collisions.record(&objects);

        let Some(row) = self.scanline.checked_sub(self.first_visible_scanline) else {
            return;
        };
        if row as u32 >= VISIBLE_HEIGHT {
            return;
        }

        let palette = Palette {
            player0: self.colup0,
            player1: self.colup1,
            playfield: self.colupf,
            background: self.colubk,
            priority: self.playfield.priority,
            score_mode: self.playfield.score_mode,
        };
        let [r, g, b] = self.resolver.resolve(palette.select(x, objects));
        self.frame.set_pixel(x as u32, row as u32, [r, g, b, 0xFF]);
    }

    /// The frame being drawn. Complete when [`ClockEvent::frame_complete`]
    /// was last reported.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Frames completed since reset
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn in_vblank(&self) -> bool {
        self.vblank || self.vsync
    }

    pub fn playfield(&self) -> &Playfield {
        &self.playfield
    }

    pub fn player_graphics(&self, n: usize) -> &PlayerGraphics {
        &self.players[n & 1].graphics
    }

    pub fn player_position(&self, n: usize) -> u8 {
        self.players[n & 1].position
    }

    /// Missile position; while locked to its player this is the lock point
    pub fn missile_position(&self, n: usize) -> u8 {
        let n = n & 1;
        if self.missiles[n].locked {
            self.missile_lock_position(n)
        } else {
            self.missiles[n].position
        }
    }

    pub fn ball_position(&self) -> u8 {
        self.ball.position
    }

    pub fn audio(&self) -> &AudioRegisters {
        &self.audio
    }
}
