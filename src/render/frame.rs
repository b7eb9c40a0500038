//! Single-slot frame handoff from the render thread to the UI.

use parking_lot::Mutex;

/// A finished frame: tightly packed RGBA8 pixels, row-major, top to bottom.
#[derive(Clone)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Single-writer, single-reader, single-slot handoff.
///
/// Publishing overwrites any unread frame; stale frames are intentionally
/// dropped so the UI always sees the latest one. Reading takes and clears
/// the slot.
#[derive(Default)]
pub struct FrameSlot {
    slot: Mutex<Option<Frame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a frame, replacing any unread one.
    pub fn publish(&self, frame: Frame) {
        *self.slot.lock() = Some(frame);
    }

    /// Take the latest frame, leaving the slot empty.
    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().take()
    }
}
