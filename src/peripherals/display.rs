//! Shared display-controller state and frame delivery.
//!
//! Both LCD variants (the monochrome multi-shade controller and the color
//! driver chip) hold a [`DisplayState`] by composition and implement the
//! [`DisplayController`] trait. Composed frames leave the emulation thread
//! as owned [`FrameUpdate`] snapshots over an mpsc channel, so a
//! presentation thread never aliases live controller state.

use std::sync::mpsc::Sender;

/// Scales a sample of `bits` significant bits to the full 8-bit range.
pub fn tru_color(value: u32, bits: u32) -> u8 {
    (value * 255 / ((1u32 << bits) - 1)) as u8
}

/// Cursor auto-increment policy applied after each data access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    XDown = 0,
    XUp = 1,
    YDown = 2,
    YUp = 3,
}

impl CursorMode {
    /// Decodes the low two bits of a cursor-mode command.
    pub fn from_bits(value: u8) -> Self {
        match value & 3 {
            0 => CursorMode::XDown,
            1 => CursorMode::XUp,
            2 => CursorMode::YDown,
            _ => CursorMode::YUp,
        }
    }
}

/// Cursor, contrast and timing state common to both LCD variants.
#[derive(Debug, Clone)]
pub struct DisplayState {
    /// Display-on flag
    pub active: bool,
    /// Cursor row/line position
    pub x: usize,
    /// Cursor column/word position
    pub y: usize,
    /// Vertical scroll offset
    pub z: usize,
    /// Contrast (mono) or backlight level (color)
    pub contrast: u32,
    /// Auto-increment policy
    pub cursor_mode: CursorMode,
    /// Addressable width in pixels
    pub width: usize,
    /// Visible width in pixels
    pub display_width: usize,
    /// Height in pixels
    pub height: usize,
    /// Elapsed time of the most recent data write, in seconds
    pub last_write: f64,
    /// Rolling average spacing between data writes
    pub write_avg: f64,
    /// Elapsed time of the most recent frame enqueue
    pub last_frame: f64,
}

impl DisplayState {
    pub fn new(width: usize, display_width: usize, height: usize) -> Self {
        DisplayState {
            active: false,
            x: 0,
            y: 0,
            z: 0,
            contrast: 0,
            cursor_mode: CursorMode::XDown,
            width,
            display_width,
            height,
            last_write: 0.0,
            write_avg: 0.0,
            last_frame: 0.0,
        }
    }

    /// Folds one data-write timestamp into the rolling write-spacing average.
    pub fn note_write(&mut self, elapsed: f64) {
        if self.last_write > 0.0 {
            let delta = elapsed - self.last_write;
            self.write_avg = self.write_avg * 0.9 + delta * 0.1;
        }
        self.last_write = elapsed;
    }

    /// Restores power-on defaults shared by both controllers.
    pub fn reset(&mut self) {
        self.active = false;
        self.x = 0;
        self.y = 0;
        self.z = 0;
        self.contrast = 0;
        self.cursor_mode = CursorMode::XDown;
        self.last_write = 0.0;
        self.write_avg = 0.0;
        self.last_frame = 0.0;
    }
}

/// Owned snapshot of a composed frame, published once per enqueue.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub active: bool,
    pub contrast: u32,
    /// Composed pixel buffer: 8bpp intensity (mono) or RGB triples (color)
    pub pixels: Vec<u8>,
}

/// Frame-delivery channel handle, injected at controller construction.
/// A disconnected or absent receiver turns delivery into a no-op.
pub type FrameSender = Sender<FrameUpdate>;

/// Common surface of the two LCD controller implementations.
pub trait DisplayController {
    fn write_command(&mut self, value: u8);
    fn write_data(&mut self, value: u8);
    fn read_command(&mut self) -> u8;
    fn read_data(&mut self) -> u8;
    fn reset(&mut self);
    fn compose_image(&self) -> Vec<u8>;
    fn state(&self) -> &DisplayState;
    fn state_mut(&mut self) -> &mut DisplayState;
}
