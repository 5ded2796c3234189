//! Monochrome multi-shade LCD controller (T6A04 class).
//!
//! The controller owns a packed 1-bit display RAM plus a ring of `shades`
//! binary frames. Grayscale comes from temporal dithering: the guest cycles
//! bit patterns frame to frame, and composition averages the queued frames
//! per pixel before applying the hardware's non-linear contrast curve.
//!
//! Command decode:
//! - 0x00/0x01: word length (6-bit / 8-bit)
//! - 0x02/0x03: display off / on
//! - 0x04-0x07: cursor auto-increment mode
//! - 0x08-0x0B: power ops (no observable state)
//! - 0x10-0x17: op-amp base level
//! - 0x20-0x3F: set Y (word column)
//! - 0x40-0x7F: set Z (vertical scroll)
//! - 0x80-0xBF: set X (row)
//! - 0xC0-0xFF: set contrast (0-63)

use super::display::{tru_color, CursorMode, DisplayController, DisplayState, FrameSender, FrameUpdate};

/// Display dimensions
pub const LCD_HEIGHT: usize = 64;
pub const LCD_DISPLAY_WIDTH: usize = 96;
/// Bytes per display-RAM row: 15 words of 8 bits, or 19 words of 6 bits
pub const LCD_MEM_WIDTH: usize = 15;
const DISPLAY_SIZE: usize = LCD_HEIGHT * LCD_MEM_WIDTH;

/// Shade-queue bounds
pub const LCD_MAX_SHADES: usize = 12;
pub const LCD_DEFAULT_SHADES: usize = 6;

/// Contrast pivot of the perceptual contrast curve
pub const LCD_MID_CONTRAST: u32 = 32;

/// Word columns per row in each addressing width
const WORDS_8BIT: usize = 15;
const WORDS_6BIT: usize = 19;

#[derive(Debug, Clone)]
pub struct MonoLcd {
    pub state: DisplayState,
    /// Addressing width: 8 or 6 bits per data word
    word_len: u8,
    /// Op-amp base level (commands 0x10-0x17)
    base_level: u8,
    shades: usize,
    /// Ring index of the most recently enqueued frame
    front: usize,
    /// Live packed-bit display RAM
    display: [u8; DISPLAY_SIZE],
    /// One binary frame per shade level
    queue: [[u8; DISPLAY_SIZE]; LCD_MAX_SHADES],
    listener: Option<FrameSender>,
}

impl MonoLcd {
    pub fn new(listener: Option<FrameSender>) -> Self {
        let mut lcd = MonoLcd {
            state: DisplayState::new(LCD_MEM_WIDTH * 8, LCD_DISPLAY_WIDTH, LCD_HEIGHT),
            word_len: 8,
            base_level: 0,
            shades: LCD_DEFAULT_SHADES,
            front: 0,
            display: [0; DISPLAY_SIZE],
            queue: [[0; DISPLAY_SIZE]; LCD_MAX_SHADES],
            listener,
        };
        lcd.reset();
        lcd
    }

    /// Number of grayscale levels, clamped to `[1, LCD_MAX_SHADES]`.
    pub fn set_shades(&mut self, shades: usize) {
        self.shades = shades.clamp(1, LCD_MAX_SHADES);
        if self.front >= self.shades {
            self.front = 0;
        }
    }

    pub fn shades(&self) -> usize {
        self.shades
    }

    pub fn word_len(&self) -> u8 {
        self.word_len
    }

    fn word_columns(&self) -> usize {
        if self.word_len == 8 {
            WORDS_8BIT
        } else {
            WORDS_6BIT
        }
    }

    /// Applies the current auto-increment policy to the cursor. X wraps
    /// modulo the row count; Y wraps at the addressing-width column count.
    pub fn advance_cursor(&mut self) {
        let columns = self.word_columns();
        match self.state.cursor_mode {
            CursorMode::XUp => self.state.x = (self.state.x + 1) % LCD_HEIGHT,
            CursorMode::XDown => {
                self.state.x = if self.state.x == 0 { LCD_HEIGHT - 1 } else { self.state.x - 1 }
            }
            CursorMode::YUp => self.state.y = (self.state.y + 1) % columns,
            CursorMode::YDown => {
                self.state.y = if self.state.y == 0 { columns - 1 } else { self.state.y - 1 }
            }
        }
    }

    /// Cursor word position, clamped into the addressable grid.
    fn word_slot(&self) -> (usize, usize) {
        let x = self.state.x % LCD_HEIGHT;
        let y = self.state.y % self.word_columns();
        (x, y)
    }

    fn store_word(&mut self, value: u8) {
        let (x, y) = self.word_slot();
        let row = x * LCD_MEM_WIDTH;
        if self.word_len == 8 {
            self.display[row + y] = value;
        } else {
            // 6-bit words straddle byte boundaries; splice through a 16-bit
            // window spanning the two affected bytes, MSB-first.
            let bit = y * 6;
            let byte = bit / 8;
            let shift = bit % 8;
            let mask = 0x3Fu16 << (10 - shift);
            let word = ((value & 0x3F) as u16) << (10 - shift);
            let mut window = (self.display[row + byte] as u16) << 8;
            if byte + 1 < LCD_MEM_WIDTH {
                window |= self.display[row + byte + 1] as u16;
            }
            window = (window & !mask) | word;
            self.display[row + byte] = (window >> 8) as u8;
            if byte + 1 < LCD_MEM_WIDTH {
                self.display[row + byte + 1] = window as u8;
            }
        }
    }

    fn load_word(&self) -> u8 {
        let (x, y) = self.word_slot();
        let row = x * LCD_MEM_WIDTH;
        if self.word_len == 8 {
            self.display[row + y]
        } else {
            let bit = y * 6;
            let byte = bit / 8;
            let shift = bit % 8;
            let mut window = (self.display[row + byte] as u16) << 8;
            if byte + 1 < LCD_MEM_WIDTH {
                window |= self.display[row + byte + 1] as u16;
            }
            ((window >> (10 - shift)) & 0x3F) as u8
        }
    }

    /// Moves the ring back one slot and copies the live frame in at the
    /// vertical-scroll offset: queue row `q` receives display row
    /// `(q + z) mod height`, realizing the scroll via offset arithmetic.
    pub fn enqueue_frame(&mut self) {
        self.front = (self.front + self.shades - 1) % self.shades;
        let z = self.state.z % LCD_HEIGHT;
        for q in 0..LCD_HEIGHT {
            let src = ((q + z) % LCD_HEIGHT) * LCD_MEM_WIDTH;
            let dst = q * LCD_MEM_WIDTH;
            self.queue[self.front][dst..dst + LCD_MEM_WIDTH]
                .copy_from_slice(&self.display[src..src + LCD_MEM_WIDTH]);
        }
        self.fire_update();
    }

    fn fire_update(&mut self) {
        if let Some(listener) = &self.listener {
            let update = FrameUpdate {
                active: self.state.active,
                contrast: self.state.contrast,
                pixels: self.compose_image(),
            };
            // A hung-up receiver makes delivery a no-op, not an error.
            let _ = listener.send(update);
        }
    }

    /// Contrast blend: below the pivot the image sinks toward black, above
    /// it washes toward white, with alpha rising as the square of the
    /// distance from the pivot. Returns (overlay, alpha percent).
    fn contrast_blend(&self) -> (u32, u32) {
        let contrast = self.state.contrast;
        if contrast < LCD_MID_CONTRAST {
            let k = LCD_MID_CONTRAST - contrast;
            (0, (k * k / 3).min(100))
        } else {
            let k = contrast - LCD_MID_CONTRAST;
            (255, (k * k / 3).min(100))
        }
    }
}

impl DisplayController for MonoLcd {
    fn write_command(&mut self, value: u8) {
        match value {
            0x00..=0x01 => self.word_len = if value & 1 != 0 { 8 } else { 6 },
            0x02..=0x03 => self.state.active = value & 1 != 0,
            0x04..=0x07 => self.state.cursor_mode = CursorMode::from_bits(value),
            0x10..=0x17 => self.base_level = value & 0x07,
            0x20..=0x3F => self.state.y = (value - 0x20) as usize,
            0x40..=0x7F => self.state.z = (value - 0x40) as usize,
            0x80..=0xBF => self.state.x = (value - 0x80) as usize,
            0xC0..=0xFF => self.state.contrast = (value - 0xC0) as u32,
            _ => {}
        }
    }

    fn write_data(&mut self, value: u8) {
        self.store_word(value);
        self.advance_cursor();
    }

    fn read_command(&mut self) -> u8 {
        let mut status = self.state.cursor_mode as u8;
        if self.word_len == 8 {
            status |= 0x40;
        }
        if self.state.active {
            status |= 0x20;
        }
        status
    }

    fn read_data(&mut self) -> u8 {
        let word = self.load_word();
        self.advance_cursor();
        word
    }

    fn reset(&mut self) {
        self.state.reset();
        self.state.contrast = LCD_MID_CONTRAST;
        self.word_len = 8;
        self.base_level = 0;
        self.front = 0;
        self.display = [0; DISPLAY_SIZE];
        self.queue = [[0; DISPLAY_SIZE]; LCD_MAX_SHADES];
        self.fire_update();
    }

    fn compose_image(&self) -> Vec<u8> {
        let size = LCD_DISPLAY_WIDTH * LCD_HEIGHT;
        if !self.state.active {
            return vec![0; size];
        }

        // Bits needed to represent a count in [0, shades]
        let bits = u32::BITS - (self.shades as u32).leading_zeros();
        let (overlay, alpha) = self.contrast_blend();

        let mut buffer = vec![0u8; size];
        for row in 0..LCD_HEIGHT {
            for col in 0..LCD_DISPLAY_WIDTH {
                let byte = row * LCD_MEM_WIDTH + col / 8;
                let mask = 0x80u8 >> (col % 8);
                let mut count = 0u32;
                for shade in 0..self.shades {
                    if self.queue[shade][byte] & mask != 0 {
                        count += 1;
                    }
                }
                let level = tru_color(count, bits) as u32;
                buffer[row * LCD_DISPLAY_WIDTH + col] =
                    ((overlay * alpha + level * (100 - alpha)) / 100) as u8;
            }
        }
        buffer
    }

    fn state(&self) -> &DisplayState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DisplayState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_new() {
        let lcd = MonoLcd::new(None);
        assert!(!lcd.state.active);
        assert_eq!(lcd.state.contrast, LCD_MID_CONTRAST);
        assert_eq!(lcd.word_len(), 8);
        assert_eq!(lcd.shades(), LCD_DEFAULT_SHADES);
    }

    #[test]
    fn test_command_decode() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x03);
        assert!(lcd.state.active);
        lcd.write_command(0x02);
        assert!(!lcd.state.active);
        lcd.write_command(0x00);
        assert_eq!(lcd.word_len(), 6);
        lcd.write_command(0x01);
        assert_eq!(lcd.word_len(), 8);
        lcd.write_command(0x2A);
        assert_eq!(lcd.state.y, 0x0A);
        lcd.write_command(0x47);
        assert_eq!(lcd.state.z, 0x07);
        lcd.write_command(0x9C);
        assert_eq!(lcd.state.x, 0x1C);
        lcd.write_command(0xC0 + 47);
        assert_eq!(lcd.state.contrast, 47);
        lcd.write_command(0x05);
        assert_eq!(lcd.state.cursor_mode, CursorMode::XUp);
    }

    #[test]
    fn test_cursor_wrap_by_word_length() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x07); // Y up
        lcd.write_command(0x20 + 14);
        lcd.write_data(0xFF);
        assert_eq!(lcd.state.y, 0); // 8-bit width wraps at 15

        lcd.write_command(0x00); // 6-bit words
        lcd.write_command(0x20 + 18);
        lcd.write_data(0x3F);
        assert_eq!(lcd.state.y, 0); // 6-bit width wraps at 19

        lcd.write_command(0x06); // Y down
        lcd.write_data(0x00);
        assert_eq!(lcd.state.y, 18);

        lcd.write_command(0x04); // X down from row 0
        lcd.write_data(0x00);
        assert_eq!(lcd.state.x, LCD_HEIGHT - 1);
    }

    #[test]
    fn test_data_round_trip_6bit() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x00); // 6-bit
        lcd.write_command(0x07); // Y up
        lcd.write_command(0x80); // X = 0
        lcd.write_command(0x20); // Y = 0
        for value in [0x15u8, 0x3F, 0x01, 0x2A] {
            lcd.write_data(value);
        }
        lcd.write_command(0x20);
        assert_eq!(lcd.read_data() & 0x3F, 0x15);
        assert_eq!(lcd.read_data() & 0x3F, 0x3F);
        assert_eq!(lcd.read_data() & 0x3F, 0x01);
        assert_eq!(lcd.read_data() & 0x3F, 0x2A);
    }

    #[test]
    fn test_status_read() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x03);
        lcd.write_command(0x05);
        assert_eq!(lcd.read_command(), 0x40 | 0x20 | 0x01);
        lcd.write_command(0x00);
        lcd.write_command(0x02);
        assert_eq!(lcd.read_command(), 0x01);
    }

    #[test]
    fn test_enqueue_decrements_front_and_scrolls() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x03);
        lcd.write_command(0x40 + 1); // Z = 1
        lcd.write_command(0x80 + 1); // X = 1
        lcd.write_command(0x20); // Y = 0
        lcd.write_data(0xAA);

        lcd.enqueue_frame();
        assert_eq!(lcd.front, LCD_DEFAULT_SHADES - 1);
        // Scroll of 1: display row 1 lands in queue row 0
        assert_eq!(lcd.queue[lcd.front][0], 0xAA);

        lcd.enqueue_frame();
        assert_eq!(lcd.front, LCD_DEFAULT_SHADES - 2);
    }

    #[test]
    fn test_compose_inactive_is_black() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x02);
        let image = lcd.compose_image();
        assert_eq!(image.len(), LCD_DISPLAY_WIDTH * LCD_HEIGHT);
        assert!(image.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_compose_full_count_neutral_contrast() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x03);
        lcd.write_command(0xC0 + LCD_MID_CONTRAST as u8); // neutral
        for shade in 0..lcd.shades {
            lcd.queue[shade][0] = 0x80; // pixel (0,0) lit in every frame
        }
        let image = lcd.compose_image();
        // count == shades through the truColor scaling, no blend at the pivot
        let bits = u32::BITS - (LCD_DEFAULT_SHADES as u32).leading_zeros();
        assert_eq!(image[0], tru_color(LCD_DEFAULT_SHADES as u32, bits));
        assert_eq!(image[1], 0);
    }

    #[test]
    fn test_compose_contrast_branches() {
        let mut lcd = MonoLcd::new(None);
        lcd.write_command(0x03);
        for shade in 0..lcd.shades {
            lcd.queue[shade][0] = 0x80;
        }
        let bits = u32::BITS - (LCD_DEFAULT_SHADES as u32).leading_zeros();
        let level = tru_color(LCD_DEFAULT_SHADES as u32, bits) as u32;

        // Contrast 0 saturates the black branch: alpha min(100, 32^2/3) = 100
        lcd.write_command(0xC0);
        assert_eq!(lcd.compose_image()[0], 0);

        // Contrast 38 blends toward white: k = 6, alpha = 12
        lcd.write_command(0xC0 + 38);
        let expected = ((255 * 12 + level * 88) / 100) as u8;
        assert_eq!(lcd.compose_image()[0], expected);
    }

    #[test]
    fn test_reset_fires_empty_frame() {
        let (tx, rx) = mpsc::channel();
        let mut lcd = MonoLcd::new(Some(tx));
        rx.try_recv().unwrap(); // construction reset
        lcd.write_command(0x03);
        lcd.write_command(0xC0 + 10);
        lcd.reset();
        let update = rx.try_recv().unwrap();
        assert!(!update.active);
        assert_eq!(update.contrast, LCD_MID_CONTRAST);
        assert!(update.pixels.iter().all(|&p| p == 0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_delivers_owned_snapshot() {
        let (tx, rx) = mpsc::channel();
        let mut lcd = MonoLcd::new(Some(tx));
        rx.try_recv().unwrap();
        lcd.write_command(0x03);
        lcd.write_command(0xC0 + LCD_MID_CONTRAST as u8);
        lcd.write_command(0x80);
        lcd.write_command(0x20);
        lcd.write_data(0x80);
        lcd.enqueue_frame();
        let first = rx.try_recv().unwrap().pixels;
        // Later mutation must not show through the delivered buffer
        lcd.write_command(0x80);
        lcd.write_command(0x20);
        lcd.write_data(0x00);
        lcd.enqueue_frame();
        assert_ne!(first[0], 0);
    }
}
