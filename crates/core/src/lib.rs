//! Core emulator primitives and traits.

pub mod cpu_6502;
pub mod display;
pub mod logging;
pub mod scheduler;
pub mod types {
    use serde::{Deserialize, Serialize};

    /// Bytes per RGBA pixel
    pub const BYTES_PER_PIXEL: usize = 4;

    /// An RGBA8 frame buffer, row-major, 4 bytes per pixel.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u8>,
    }

    impl Frame {
        /// A fully transparent black frame
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            }
        }

        /// Byte offset of pixel (x, y), or None when outside the frame
        #[inline]
        pub fn offset(&self, x: u32, y: u32) -> Option<usize> {
            if x < self.width && y < self.height {
                Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
            } else {
                None
            }
        }

        /// Store one pixel; out-of-range coordinates are ignored
        #[inline]
        pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> bool {
            match self.offset(x, y) {
                Some(at) => {
                    self.pixels[at..at + BYTES_PER_PIXEL].copy_from_slice(&rgba);
                    true
                }
                None => false,
            }
        }

        pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
            self.offset(x, y).map(|at| {
                let mut rgba = [0; 4];
                rgba.copy_from_slice(&self.pixels[at..at + BYTES_PER_PIXEL]);
                rgba
            })
        }

        pub fn fill(&mut self, rgba: [u8; 4]) {
            for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&rgba);
            }
        }
    }
}

use serde_json::Value;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge")
    pub id: String,
    /// User-friendly name for display (e.g., "Cartridge Slot")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["a26", "bin"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state, keeping mounted media
    fn reset(&mut self);

    /// Emulate one frame and return the system's frame buffer.
    ///
    /// The buffer is owned by the system and overwritten in place on the next
    /// call.
    fn step_frame(&mut self) -> Result<&types::Frame, Self::Error>;

    /// Return a JSON-serializable save state.
    /// Save states never include ROM/cartridge data.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    /// Returns error if the state is incompatible.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
