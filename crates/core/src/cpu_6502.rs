//! 6502-family CPU contract
//!
//! The instruction-set core itself lives outside this workspace. Systems only
//! see it through two traits:
//!
//! - [`Memory6502`]: the byte-addressed bus a core reads and writes through.
//! - [`Cpu6502`]: a steppable core that is handed the bus on every call.
//!
//! Passing the bus into `step` (rather than letting the core own it) keeps the
//! system free to clock its other chips between CPU steps without any shared
//! ownership.

/// Interrupt lines a 6502-family core may poll for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Nmi,
    Irq,
    Reset,
}

impl Interrupt {
    /// Address of the little-endian handler vector
    pub fn vector(self) -> u16 {
        match self {
            Interrupt::Nmi => 0xFFFA,
            Interrupt::Irq => 0xFFFE,
            Interrupt::Reset => 0xFFFC,
        }
    }
}

/// Memory interface for a 6502-family CPU
pub trait Memory6502 {
    /// Read a byte from memory at the given address
    fn read(&self, addr: u16) -> u8;

    /// Write a byte to memory at the given address
    fn write(&mut self, addr: u16, val: u8);

    /// Sample the interrupt lines. Called at most once per instruction.
    fn poll_interrupts(&mut self) -> Option<Interrupt> {
        None
    }
}

/// A steppable 6502-family core.
pub trait Cpu6502: Send {
    /// Reset the core, typically reloading the PC from the reset vector
    fn reset(&mut self, memory: &mut dyn Memory6502);

    /// Execute one instruction and return the CPU cycles it consumed
    fn step(&mut self, memory: &mut dyn Memory6502) -> u32;

    /// Register snapshot for save states. Cores without one report `Null`.
    fn save_state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn load_state(&mut self, _state: &serde_json::Value) -> Result<(), serde_json::Error> {
        Ok(())
    }
}
