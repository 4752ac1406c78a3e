//! CPU slot for the Atari 2600 (6507, a 6502 with a 13-bit address bus)
//!
//! The instruction-set core is supplied from outside through the
//! [`Cpu6502`] contract. With no core attached the slot steps as a no-op, so
//! the TIA still produces frames.

use std::fmt;

use serde_json::Value;
use vcs_core::cpu_6502::Cpu6502;
use vcs_core::logging::{log, LogCategory, LogLevel};

use crate::bus::Atari2600Bus;

/// Atari 2600 CPU slot
#[derive(Default)]
pub struct Atari2600Cpu {
    core: Option<Box<dyn Cpu6502>>,
    steps: u64,
}

impl fmt::Debug for Atari2600Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atari2600Cpu")
            .field("attached", &self.core.is_some())
            .field("steps", &self.steps)
            .finish()
    }
}

impl Atari2600Cpu {
    /// An empty slot
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core(core: Box<dyn Cpu6502>) -> Self {
        Self {
            core: Some(core),
            steps: 0,
        }
    }

    /// Install a core, replacing any previous one
    pub fn attach(&mut self, core: Box<dyn Cpu6502>) {
        self.core = Some(core);
        self.steps = 0;
    }

    pub fn is_attached(&self) -> bool {
        self.core.is_some()
    }

    /// Reset the core through the bus (reads the reset vector)
    pub fn reset(&mut self, bus: &mut Atari2600Bus) {
        self.steps = 0;
        match &mut self.core {
            Some(core) => core.reset(bus),
            None => log(LogCategory::Cpu, LogLevel::Debug, || {
                "CPU: reset with no core attached".to_string()
            }),
        }
    }

    /// Execute one instruction, returning the cycles it took
    pub fn step(&mut self, bus: &mut Atari2600Bus) -> u32 {
        match &mut self.core {
            Some(core) => {
                self.steps += 1;
                core.step(bus)
            }
            None => 0,
        }
    }

    pub fn save_state(&self) -> Value {
        self.core.as_ref().map_or(Value::Null, |core| core.save_state())
    }

    pub fn load_state(&mut self, state: &Value) -> Result<(), serde_json::Error> {
        match &mut self.core {
            Some(core) => core.load_state(state),
            None => Ok(()),
        }
    }

    /// Instructions stepped since the last reset
    pub fn steps(&self) -> u64 {
        self.steps
    }
}
