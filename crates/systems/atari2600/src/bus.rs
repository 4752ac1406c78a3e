//! Atari 2600 memory bus
//!
//! The 6507 drives 13 address lines and the console decodes only three of
//! them, so every chip appears mirrored many times over:
//!
//! ```text
//! A12 set                  cartridge ROM  (addr & 0x0FFF)
//! A12 clear, A7 clear      TIA            (write addr & 0x3F, read addr & 0x0F)
//! A12 clear, A7 set, A9 0  RIOT RAM       (addr & 0x7F)
//! A12 clear, A7 set, A9 1  RIOT IO/timer  (addr & 0x1F)
//! ```

use serde::{Deserialize, Serialize};
use vcs_core::cpu_6502::{Interrupt, Memory6502};
use vcs_core::logging::{log, LogCategory, LogLevel};

use crate::cartridge::Cartridge;
use crate::riot::Riot;
use crate::tia::{ClockEvent, Tia};

/// Mask for the 6507's 13 address lines
pub const ADDRESS_MASK: u16 = 0x1FFF;

/// Chip selected by an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Cartridge,
    Tia,
    RiotRam,
    RiotIo,
}

/// A 13-bit address as seen by the console's decode logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusAddress(u16);

impl BusAddress {
    pub fn new(addr: u16) -> Self {
        Self(addr & ADDRESS_MASK)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    /// A12: cartridge select
    #[inline]
    pub fn rom_select(self) -> bool {
        self.0 & 0x1000 != 0
    }

    /// A7: RIOT select (TIA when clear)
    #[inline]
    pub fn riot_select(self) -> bool {
        self.0 & 0x0080 != 0
    }

    /// A9: RIOT IO select (RAM when clear)
    #[inline]
    pub fn io_select(self) -> bool {
        self.0 & 0x0200 != 0
    }

    pub fn region(self) -> Region {
        if self.rom_select() {
            Region::Cartridge
        } else if !self.riot_select() {
            Region::Tia
        } else if !self.io_select() {
            Region::RiotRam
        } else {
            Region::RiotIo
        }
    }
}

/// Atari 2600 memory bus
#[derive(Debug, Serialize, Deserialize)]
pub struct Atari2600Bus {
    pub tia: Tia,
    pub riot: Riot,
    #[serde(skip)]
    pub cartridge: Option<Cartridge>,
}

impl Default for Atari2600Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Atari2600Bus {
    pub fn new() -> Self {
        Self {
            tia: Tia::new(),
            riot: Riot::new(),
            cartridge: None,
        }
    }

    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    /// Reset the chips; the cartridge stays inserted
    pub fn reset(&mut self) {
        self.tia.reset();
        self.riot.reset();
    }

    /// Advance the TIA one dot. WSYNC is released as the dot counter wraps,
    /// so a halted CPU resumes at the start of the next scanline.
    pub fn clock(&mut self) -> ClockEvent {
        let event = self.tia.clock();
        if event.new_scanline {
            self.tia.release_wait();
        }
        event
    }

    /// Whether the CPU is currently halted by WSYNC
    pub fn cpu_stalled(&self) -> bool {
        self.tia.is_waiting()
    }
}

impl Memory6502 for Atari2600Bus {
    fn read(&self, addr: u16) -> u8 {
        let addr = BusAddress::new(addr);
        match addr.region() {
            Region::Cartridge => match &self.cartridge {
                Some(cart) => cart.read(addr.raw()),
                None => {
                    log(LogCategory::Bus, LogLevel::Debug, || {
                        format!("Bus: read ${:04X} with no cartridge inserted", addr.raw())
                    });
                    0
                }
            },
            Region::Tia => self.tia.read((addr.raw() & 0x0F) as u8),
            Region::RiotRam => self.riot.read_ram(addr.raw()),
            Region::RiotIo => self.riot.read_io(addr.raw()),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        let addr = BusAddress::new(addr);
        match addr.region() {
            Region::Cartridge => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("Bus: ignored write ${:04X} = 0x{:02X} to ROM", addr.raw(), val)
                });
            }
            Region::Tia => self.tia.write((addr.raw() & 0x3F) as u8, val),
            Region::RiotRam => self.riot.write_ram(addr.raw(), val),
            Region::RiotIo => self.riot.write_io(addr.raw(), val),
        }
    }

    /// The 6507 has no interrupt pins
    fn poll_interrupts(&mut self) -> Option<Interrupt> {
        None
    }
}
