//! Display contract
//!
//! A system hands each completed frame to a [`FrameSink`] by reference. There
//! is no backpressure: the sink must copy what it wants to keep before
//! returning, because the buffer is overwritten by the next frame.

use crate::types::Frame;

/// Receiver for completed frames.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame),
{
    fn present(&mut self, frame: &Frame) {
        self(frame)
    }
}

/// Discards every frame (headless runs, benchmarks)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame) {}
}

/// Keeps a copy of the most recent frame.
#[derive(Debug, Default, Clone)]
pub struct LatestFrame {
    frame: Option<Frame>,
    presented: u64,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Number of frames presented so far
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl FrameSink for LatestFrame {
    fn present(&mut self, frame: &Frame) {
        match self.frame.as_mut() {
            // Reuse the allocation when dimensions match
            Some(kept) if kept.width == frame.width && kept.height == frame.height => {
                kept.pixels.copy_from_slice(&frame.pixels);
            }
            _ => self.frame = Some(frame.clone()),
        }
        self.presented += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = 0;
        {
            let mut sink = |f: &Frame| seen += f.width;
            sink.present(&Frame::new(3, 1));
            sink.present(&Frame::new(5, 1));
        }
        assert_eq!(seen, 8);
    }

    #[test]
    fn test_latest_frame_keeps_copy() {
        let mut sink = LatestFrame::new();
        assert!(sink.frame().is_none());

        let mut f = Frame::new(2, 2);
        f.set_pixel(1, 1, [1, 2, 3, 4]);
        sink.present(&f);

        f.fill([0, 0, 0, 0]);
        assert_eq!(sink.frame().and_then(|k| k.pixel(1, 1)), Some([1, 2, 3, 4]));

        sink.present(&f);
        assert_eq!(sink.presented(), 2);
        assert_eq!(sink.frame().and_then(|k| k.pixel(1, 1)), Some([0, 0, 0, 0]));
    }
}
