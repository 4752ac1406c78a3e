//! Atari 2600 system implementation
//!
//! One frame is a fixed count of TIA dots. The TIA is clocked on every dot
//! and the CPU steps once every 4 dots unless WSYNC has halted it:
//!
//! ```text
//! for tick in 0..59736:
//!     bus.clock()                      // one TIA dot, may release WSYNC
//!     if tick % 4 == 0 and not stalled:
//!         cpu.step(bus)                // reads/writes go through the bus
//! ```

#![allow(clippy::upper_case_acronyms)]

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod riot;
pub mod tia;
pub mod tia_graphics;
pub mod tia_renderer;

use std::sync::Arc;

use bus::Atari2600Bus;
use cartridge::{Cartridge, CartridgeError};
use cpu::Atari2600Cpu;
use serde::de::Error as _;
use serde_json::Value;
use thiserror::Error;
use tia::{DOTS_PER_SCANLINE, SCANLINES_PER_FRAME};
use tia_renderer::ColorResolver;
use vcs_core::cpu_6502::Cpu6502;
use vcs_core::logging::{log, LogCategory, LogLevel};
use vcs_core::{types::Frame, MountPointInfo, System};

/// TIA dots in one full 262-scanline sweep
pub const CYCLES_PER_FRAME: u32 = DOTS_PER_SCANLINE as u32 * SCANLINES_PER_FRAME as u32;

/// TIA dots per CPU step
pub const CPU_CLOCK_DIVIDER: u32 = 4;

const CARTRIDGE_MOUNT: &str = "Cartridge";
const STATE_VERSION: u64 = 1;
const STATE_SYSTEM: &str = "atari2600";

#[derive(Debug, Error)]
pub enum Atari2600Error {
    #[error("Cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
}

/// Atari 2600 system
#[derive(Debug, Default)]
pub struct Atari2600System {
    cpu: Atari2600Cpu,
    bus: Atari2600Bus,
    ticks: u64,
    frames: u64,
}

impl Atari2600System {
    /// A console with an empty CPU slot
    pub fn new() -> Self {
        Self::default()
    }

    /// A console driven by the given CPU core
    pub fn with_cpu(core: Box<dyn Cpu6502>) -> Self {
        Self {
            cpu: Atari2600Cpu::with_core(core),
            ..Self::default()
        }
    }

    /// Install a CPU core and reset it through the bus
    pub fn attach_cpu(&mut self, core: Box<dyn Cpu6502>) {
        self.cpu.attach(core);
        self.cpu.reset(&mut self.bus);
    }

    /// Scanline drawn into frame row 0
    pub fn set_first_visible_scanline(&mut self, scanline: u16) {
        self.bus.tia.set_first_visible_scanline(scanline);
    }

    pub fn set_color_resolver(&mut self, resolver: Arc<dyn ColorResolver>) {
        self.bus.tia.set_color_resolver(resolver);
    }

    pub fn bus(&self) -> &Atari2600Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Atari2600Bus {
        &mut self.bus
    }

    /// CPU instructions stepped since the last reset
    pub fn cpu_steps(&self) -> u64 {
        self.cpu.steps()
    }

    /// Run a single dot
    pub fn tick(&mut self) {
        self.bus.clock();
        if self.ticks % CPU_CLOCK_DIVIDER as u64 == 0 && !self.bus.cpu_stalled() {
            self.cpu.step(&mut self.bus);
        }
        self.ticks += 1;
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            scanline: self.bus.tia.scanline(),
            dot: self.bus.tia.dot(),
            frames: self.frames,
            rom_size: self.bus.cartridge.as_ref().map(|cart| cart.size()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub scanline: u16,
    pub dot: u16,
    pub frames: u64,
    pub rom_size: Option<usize>,
}

impl System for Atari2600System {
    type Error = Atari2600Error;

    fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.ticks = 0;
        self.frames = 0;
    }

    fn step_frame(&mut self) -> Result<&Frame, Self::Error> {
        // The tick counter is kept frame-aligned so the CPU phase (tick % 4)
        // restarts with every frame
        let start = self.ticks - self.ticks % CYCLES_PER_FRAME as u64;
        let end = start + CYCLES_PER_FRAME as u64;
        while self.ticks < end {
            self.tick();
        }
        self.frames += 1;

        log(LogCategory::Tia, LogLevel::Trace, || {
            format!(
                "Frame {} done at scanline {} dot {}",
                self.frames,
                self.bus.tia.scanline(),
                self.bus.tia.dot()
            )
        });
        Ok(self.bus.tia.frame())
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": STATE_VERSION,
            "system": STATE_SYSTEM,
            "ticks": self.ticks,
            "frames": self.frames,
            "bus": &self.bus,
            "cpu": self.cpu.save_state(),
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != STATE_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported save state version {}",
                version
            )));
        }

        let system = v["system"].as_str().unwrap_or("");
        if system != STATE_SYSTEM {
            return Err(serde_json::Error::custom(format!(
                "save state is for system '{}'",
                system
            )));
        }

        let mut bus: Atari2600Bus = match v.get("bus") {
            Some(bus_value) => serde_json::from_value(bus_value.clone())?,
            None => return Err(serde_json::Error::missing_field("bus")),
        };
        if let Some(cpu_value) = v.get("cpu") {
            self.cpu.load_state(cpu_value)?;
        }

        // Cartridge data and host display settings are not part of the state
        bus.cartridge = self.bus.cartridge.take();
        bus.tia
            .set_color_resolver(Arc::clone(self.bus.tia.color_resolver()));
        bus.tia
            .set_first_visible_scanline(self.bus.tia.first_visible_scanline());
        self.bus = bus;
        self.ticks = v["ticks"].as_u64().unwrap_or(0);
        self.frames = v["frames"].as_u64().unwrap_or(0);

        log(LogCategory::Scheduler, LogLevel::Info, || {
            format!("Loaded save state at frame {}", self.frames)
        });
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE_MOUNT.to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: vec!["a26".to_string(), "bin".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(Atari2600Error::InvalidMountPoint(
                mount_point_id.to_string(),
            ));
        }

        let cartridge = Cartridge::new(data.to_vec())?;
        self.bus.load_cartridge(cartridge);
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(Atari2600Error::InvalidMountPoint(
                mount_point_id.to_string(),
            ));
        }
        self.bus.cartridge = None;
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE_MOUNT && self.bus.cartridge.is_some()
    }
}
