//! Atari 2600 cartridge
//!
//! A flat ROM image seen through the 4K cartridge window ($1000-$1FFF after
//! 13-bit masking). Smaller images (2K) mirror across the window. Bank
//! switching schemes are not supported: images over 4K only expose their
//! first 4K.

use thiserror::Error;
use vcs_core::logging::{log, LogCategory, LogLevel};

/// Size of the cartridge address window
pub const ROM_WINDOW: usize = 0x1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("ROM image is empty")]
    Empty,
}

/// Atari 2600 cartridge
#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
}

impl Cartridge {
    /// Create a new cartridge from ROM data
    pub fn new(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        if rom.is_empty() {
            return Err(CartridgeError::Empty);
        }
        if rom.len() > ROM_WINDOW {
            log(LogCategory::Bus, LogLevel::Warn, || {
                format!(
                    "Cartridge: {} byte image has no bank switching, only the first 4K is visible",
                    rom.len()
                )
            });
        }
        Ok(Self { rom })
    }

    /// Read from the cartridge window
    pub fn read(&self, addr: u16) -> u8 {
        let offset = (addr as usize & (ROM_WINDOW - 1)) % self.rom.len();
        self.rom[offset]
    }

    pub fn size(&self) -> usize {
        self.rom.len()
    }
}
