//! RIOT (6532) address window
//!
//! Only the chip's footprint on the bus is modeled: 128 bytes of RAM and a
//! 32-byte IO/timer register window. The IO window is plain storage; timer
//! countdown, port direction and controller inputs are not emulated, so reads
//! return whatever was last written there.
//!
//! ```text
//! A9 clear:  RAM      (addr & 0x7F)
//! A9 set:    IO/timer (addr & 0x1F)
//! ```

use serde::{Deserialize, Serialize};
use vcs_core::logging::{log, LogCategory, LogLevel};

pub const RAM_SIZE: usize = 128;
pub const IO_SIZE: usize = 32;

mod serde_ram {
    use super::RAM_SIZE;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(arr: &[u8; RAM_SIZE], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        arr.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; RAM_SIZE], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<u8>::deserialize(deserializer)?;
        <[u8; RAM_SIZE]>::try_from(vec.as_slice())
            .map_err(|_| D::Error::invalid_length(vec.len(), &"128 bytes of RIOT RAM"))
    }
}

/// RIOT RAM and IO window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Riot {
    #[serde(with = "serde_ram")]
    ram: [u8; RAM_SIZE],
    io: [u8; IO_SIZE],
}

impl Default for Riot {
    fn default() -> Self {
        Self::new()
    }
}

impl Riot {
    pub fn new() -> Self {
        Self {
            ram: [0; RAM_SIZE],
            io: [0; IO_SIZE],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        self.ram[addr as usize & (RAM_SIZE - 1)]
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        self.ram[addr as usize & (RAM_SIZE - 1)] = val;
    }

    pub fn read_io(&self, addr: u16) -> u8 {
        let reg = addr as usize & (IO_SIZE - 1);
        log(LogCategory::Riot, LogLevel::Trace, || {
            format!("RIOT: IO register 0x{:02X} read (storage only)", reg)
        });
        self.io[reg]
    }

    pub fn write_io(&mut self, addr: u16, val: u8) {
        let reg = addr as usize & (IO_SIZE - 1);
        log(LogCategory::Riot, LogLevel::Trace, || {
            format!("RIOT: IO register 0x{:02X} = 0x{:02X} (storage only)", reg, val)
        });
        self.io[reg] = val;
    }

    pub fn ram(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }
}
