//! Color LCD driver chip (ILI9335 class, driver code 0x9335).
//!
//! The chip exposes a 16-bit register file behind an 8-bit command/data
//! port pair: two command-port writes select a register index, two (or, in
//! 18-bit GRAM mode, three) data-port writes form the value. Pixel data
//! written through the GRAM register lands in a raw 6-bit-per-channel frame
//! buffer at the cursor, which auto-advances within the window bounds per
//! the entry-mode increment flags.
//!
//! Composition assembles the visible frame from the last enqueued snapshot,
//! honoring gate-scan window and direction, interlacing, the base-image
//! scroll, and up to two partial-image overlays with hardware wraparound.

use super::display::{tru_color, DisplayController, DisplayState, FrameSender, FrameUpdate};

/// Panel dimensions: 320 gate lines per row, 240 source rows, 3 bytes/pixel
pub const COLOR_LCD_WIDTH: usize = 320;
pub const COLOR_LCD_HEIGHT: usize = 240;
pub const COLOR_LCD_DEPTH: usize = 3;
pub const COLOR_LCD_DISPLAY_SIZE: usize = COLOR_LCD_WIDTH * COLOR_LCD_HEIGHT * COLOR_LCD_DEPTH;

const ROW_BYTES: usize = COLOR_LCD_WIDTH * COLOR_LCD_DEPTH;

/// Backlight level steps; the contrast alpha gate opens everywhere except
/// the top level.
pub const MAX_BACKLIGHT_LEVEL: u32 = 36;

/// Driver code returned by register 0x00
pub const DRIVER_CODE_VER: u16 = 0x9335;

/// Register addresses
pub mod regs {
    pub const DRIVER_CODE: usize = 0x00;
    pub const DRIVER_OUTPUT_CONTROL1: usize = 0x01;
    pub const ENTRY_MODE: usize = 0x03;
    pub const DATA_FORMAT_16BIT: usize = 0x05;
    pub const DISPLAY_CONTROL1: usize = 0x07;
    pub const DISPLAY_CONTROL2: usize = 0x08;
    pub const DISPLAY_CONTROL3: usize = 0x09;
    pub const DISPLAY_CONTROL4: usize = 0x0A;
    pub const RGB_INTERFACE_CONTROL1: usize = 0x0C;
    pub const FRAME_MARKER: usize = 0x0D;
    pub const RGB_INTERFACE_CONTROL2: usize = 0x0F;
    pub const POWER_CONTROL1: usize = 0x10;
    pub const POWER_CONTROL2: usize = 0x11;
    pub const POWER_CONTROL3: usize = 0x12;
    pub const POWER_CONTROL4: usize = 0x13;
    pub const CUR_Y: usize = 0x20;
    pub const CUR_X: usize = 0x21;
    pub const GRAM: usize = 0x22;
    pub const POWER_CONTROL7: usize = 0x29;
    pub const FRAME_RATE_COLOR_CONTROL: usize = 0x2B;
    pub const GAMMA_CONTROL1: usize = 0x30;
    pub const GAMMA_CONTROL2: usize = 0x31;
    pub const GAMMA_CONTROL3: usize = 0x32;
    pub const GAMMA_CONTROL4: usize = 0x35;
    pub const GAMMA_CONTROL5: usize = 0x36;
    pub const GAMMA_CONTROL6: usize = 0x37;
    pub const GAMMA_CONTROL7: usize = 0x38;
    pub const GAMMA_CONTROL8: usize = 0x39;
    pub const GAMMA_CONTROL9: usize = 0x3C;
    pub const GAMMA_CONTROL10: usize = 0x3D;
    pub const WINDOW_HORZ_START: usize = 0x50;
    pub const WINDOW_HORZ_END: usize = 0x51;
    pub const WINDOW_VERT_START: usize = 0x52;
    pub const WINDOW_VERT_END: usize = 0x53;
    pub const GATE_SCAN_CONTROL: usize = 0x60;
    pub const BASE_IMAGE_DISPLAY_CONTROL: usize = 0x61;
    pub const VERTICAL_SCROLL_CONTROL: usize = 0x6A;
    pub const PARTIAL_IMAGE1_POS: usize = 0x80;
    pub const PARTIAL_IMAGE1_START: usize = 0x81;
    pub const PARTIAL_IMAGE1_END: usize = 0x82;
    pub const PARTIAL_IMAGE2_POS: usize = 0x83;
    pub const PARTIAL_IMAGE2_START: usize = 0x84;
    pub const PARTIAL_IMAGE2_END: usize = 0x85;
    pub const PANEL_INTERFACE_CONTROL1: usize = 0x90;
    pub const PANEL_INTERFACE_CONTROL2: usize = 0x92;
    pub const PANEL_INTERFACE_CONTROL4: usize = 0x95;
    pub const PANEL_INTERFACE_CONTROL5: usize = 0x97;
    pub const OTP_VCM_PROGRAMMING_CONTROL: usize = 0xA1;
    pub const OTP_VCM_STATUS_AND_ENABLE: usize = 0xA2;
    pub const OTP_PROGRAMMING_ID_KEY: usize = 0xA5;
    pub const DEEP_STAND_BY_MODE_CONTROL: usize = 0xE6;
}

/// Per-register write masks
mod mask {
    pub const DRIVER_OUTPUT_CONTROL1: u16 = 0x0500;
    pub const ENTRY_MODE: u16 = 0xD0B8;
    pub const DATA_FORMAT_16BIT: u16 = 0x0003;
    pub const DISPLAY_CONTROL1: u16 = 0x313B;
    pub const DISPLAY_CONTROL2: u16 = 0xFFFF;
    pub const DISPLAY_CONTROL3: u16 = 0x073F;
    pub const DISPLAY_CONTROL4: u16 = 0x000F;
    pub const RGB_INTERFACE_CONTROL1: u16 = 0x7133;
    pub const FRAME_MARKER: u16 = 0x01FF;
    pub const RGB_INTERFACE_CONTROL2: u16 = 0x001B;
    pub const POWER_CONTROL1: u16 = 0x17F3;
    pub const POWER_CONTROL2: u16 = 0x0777;
    pub const POWER_CONTROL3: u16 = 0x008F;
    pub const POWER_CONTROL4: u16 = 0x1F00;
    pub const CUR_Y: u16 = 0x00FF;
    pub const CUR_X: u16 = 0x01FF;
    pub const POWER_CONTROL7: u16 = 0x003F;
    pub const FRAME_RATE_COLOR_CONTROL: u16 = 0x000F;
    pub const GAMMA_CONTROL: u16 = 0x0707;
    pub const GAMMA_CONTROL_5_10: u16 = 0x1F0F;
    pub const WINDOW_HORZ: u16 = 0x00FF;
    pub const WINDOW_VERT: u16 = 0x01FF;
    pub const GATE_SCAN_CONTROL: u16 = 0xBF3F;
    pub const BASE_IMAGE_DISPLAY_CONTROL: u16 = 0x0007;
    pub const VERTICAL_SCROLL_CONTROL: u16 = 0x01FF;
    pub const PARTIAL_IMAGE: u16 = 0x01FF;
    pub const PANEL_INTERFACE_CONTROL1: u16 = 0x031F;
    pub const PANEL_INTERFACE_CONTROL2: u16 = 0x0700;
    pub const PANEL_INTERFACE_CONTROL4: u16 = 0x0300;
    pub const PANEL_INTERFACE_CONTROL5: u16 = 0x0F00;
    pub const OTP_VCM_PROGRAMMING_CONTROL: u16 = 0x083F;
    pub const OTP_VCM_STATUS_AND_ENABLE: u16 = 0xFF01;
    pub const OTP_PROGRAMMING_ID_KEY: u16 = 0xFFFF;
    pub const DEEP_STAND_BY_MODE_CONTROL: u16 = 0x0001;
}

/// Driver-output-control bits
mod drv {
    pub const FLIP_COLS: u16 = 1 << 8;
    pub const INTERLACED: u16 = 1 << 10;
}

/// Entry-mode bits
pub mod entry {
    pub const CUR_DIR: u16 = 1 << 3;
    pub const ROW_INC: u16 = 1 << 4;
    pub const COL_INC: u16 = 1 << 5;
    pub const ORG: u16 = 1 << 7;
    pub const BGR: u16 = 1 << 12;
    pub const EIGHTEEN_BIT: u16 = 1 << 14;
    pub const UNPACKED: u16 = 1 << 15;
    pub const TRI: u16 = EIGHTEEN_BIT | UNPACKED;
}

/// Display-control-1 bits
pub mod disp1 {
    pub const DISPLAY_ON: u16 = 1 | (1 << 1);
    pub const COLOR8: u16 = 1 << 3;
    pub const BASEE: u16 = 1 << 8;
    pub const SHOW_PARTIAL1: u16 = 1 << 12;
    pub const SHOW_PARTIAL2: u16 = 1 << 13;
}

/// Gate-scan-control bits
mod gate {
    pub const BASE_START: u16 = 63;
    pub const BASE_NLINES: u16 = 16128;
    pub const SCAN_DIR: u16 = 1 << 15;
}

/// Base-image-display-control bits
mod base_img {
    pub const LEVEL_INVERT: u16 = 1;
    pub const SCROLL_ENABLED: u16 = 1 << 1;
    pub const NDL: u16 = 1 << 2;
}

/// Frame-rate table indexed by the low nibble of the frame-rate register;
/// selectors 14-15 are invalid and trip panic mode. Selector 6 historically
/// carried 44 before being corrected to 34.
const FRAME_RATES: [u32; 14] = [31, 32, 34, 36, 39, 41, 34, 48, 52, 57, 62, 69, 78, 89];

fn pixel_offset(x: usize, y: usize) -> usize {
    (y * COLOR_LCD_WIDTH + x) * COLOR_LCD_DEPTH
}

#[derive(Debug, Clone)]
pub struct ColorLcd {
    pub state: DisplayState,
    /// Register index accumulated from command-port bytes
    current_register: u16,
    registers: [u16; 0x100],
    /// Raw frame buffer, 6-bit samples
    display: Vec<u8>,
    /// Snapshot taken at the last enqueue; composition reads from here
    queued: Vec<u8>,
    read_buffer: u32,
    write_buffer: u32,
    read_step: u8,
    write_step: u8,
    panic_mode: bool,
    frame_rate: u32,
    front_porch: u32,
    back_porch: u32,
    display_lines: u32,
    clocks_per_line: u32,
    clock_divider: u32,
    line_time: f64,
    backlight_active: bool,
    listener: Option<FrameSender>,
}

impl ColorLcd {
    pub fn new(listener: Option<FrameSender>) -> Self {
        let mut lcd = ColorLcd {
            state: DisplayState::new(COLOR_LCD_WIDTH, COLOR_LCD_WIDTH, COLOR_LCD_HEIGHT),
            current_register: 0,
            registers: [0; 0x100],
            display: vec![0; COLOR_LCD_DISPLAY_SIZE],
            queued: vec![0; COLOR_LCD_DISPLAY_SIZE],
            read_buffer: 0,
            write_buffer: 0,
            read_step: 0,
            write_step: 0,
            panic_mode: false,
            frame_rate: 0,
            front_porch: 0,
            back_porch: 0,
            display_lines: 0,
            clocks_per_line: 0,
            clock_divider: 1,
            line_time: 0.0,
            backlight_active: true,
            listener,
        };
        lcd.reset();
        lcd
    }

    pub fn register(&self, reg: usize) -> u16 {
        self.registers[reg]
    }

    fn reg_mask(&self, reg: usize, bits: u16) -> u16 {
        self.registers[reg] & bits
    }

    pub fn current_register(&self) -> u16 {
        self.current_register
    }

    pub fn panic_mode(&self) -> bool {
        self.panic_mode
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn clock_divider(&self) -> u32 {
        self.clock_divider
    }

    pub fn line_time(&self) -> f64 {
        self.line_time
    }

    pub fn backlight_active(&self) -> bool {
        self.backlight_active
    }

    pub fn set_backlight(&mut self, active: bool) {
        self.backlight_active = active;
    }

    fn set_line_time(&mut self) {
        let refresh = self.frame_rate as u64
            * (self.display_lines + self.front_porch + self.back_porch) as u64
            * self.clocks_per_line as u64
            / self.clock_divider as u64;
        self.line_time = 1.0 / refresh as f64;
    }

    fn reset_y(&mut self, mode: u16) {
        if mode & entry::ROW_INC == 0 {
            self.state.y = self.registers[regs::WINDOW_HORZ_END] as usize;
        } else {
            self.state.y = self.registers[regs::WINDOW_HORZ_START] as usize;
        }
    }

    fn reset_x(&mut self, mode: u16) {
        if mode & entry::COL_INC == 0 {
            self.state.x = self.registers[regs::WINDOW_VERT_END] as usize;
        } else {
            self.state.x = self.registers[regs::WINDOW_VERT_START] as usize;
        }
    }

    /// Masked register store plus the register-specific side effects.
    pub fn set_register(&mut self, reg: u16, value: u16) {
        let reg = (reg & 0xFF) as usize;
        let mode = self.registers[regs::ENTRY_MODE];

        match reg {
            regs::DRIVER_CODE => {}

            regs::DRIVER_OUTPUT_CONTROL1 => {
                self.registers[reg] = value & mask::DRIVER_OUTPUT_CONTROL1;
            }

            regs::ENTRY_MODE => {
                self.registers[reg] = value & mask::ENTRY_MODE;
                if mode & entry::ORG != 0 {
                    // Origin mode snaps the cursor per the new increment bits
                    self.reset_x(value);
                    self.reset_y(value);
                }
            }

            regs::DATA_FORMAT_16BIT => {
                self.registers[reg] = value & mask::DATA_FORMAT_16BIT;
            }

            regs::DISPLAY_CONTROL1 => {
                self.registers[reg] = value & mask::DISPLAY_CONTROL1;
                self.state.active = value & disp1::DISPLAY_ON != 0;
                // An active-flag change must reach the listener immediately
                self.enqueue();
            }

            regs::DISPLAY_CONTROL2 => {
                self.registers[reg] = value & mask::DISPLAY_CONTROL2;
                self.back_porch = (value & 0x00FF) as u32;
                self.front_porch = (value >> 8) as u32;
                self.set_line_time();
            }

            regs::DISPLAY_CONTROL3 => {
                self.registers[reg] = value & mask::DISPLAY_CONTROL3;
            }

            regs::DISPLAY_CONTROL4 => {
                self.registers[reg] = value & mask::DISPLAY_CONTROL4;
            }

            regs::RGB_INTERFACE_CONTROL1 => {
                self.registers[reg] = value & mask::RGB_INTERFACE_CONTROL1;
            }

            regs::FRAME_MARKER => {
                self.registers[reg] = value & mask::FRAME_MARKER;
            }

            regs::RGB_INTERFACE_CONTROL2 => {
                self.registers[reg] = value & mask::RGB_INTERFACE_CONTROL2;
            }

            regs::POWER_CONTROL1 => {
                self.registers[reg] = value & mask::POWER_CONTROL1;
            }

            regs::POWER_CONTROL2 => {
                self.registers[reg] = value & mask::POWER_CONTROL2;
            }

            regs::POWER_CONTROL3 => {
                self.registers[reg] = value & mask::POWER_CONTROL3;
            }

            regs::POWER_CONTROL4 => {
                self.registers[reg] = value & mask::POWER_CONTROL4;
            }

            regs::CUR_X | regs::CUR_Y => {
                self.registers[reg] =
                    value & if reg == regs::CUR_X { mask::CUR_X } else { mask::CUR_Y };
                if mode & entry::ORG != 0 {
                    if reg == regs::CUR_Y {
                        self.reset_y(mode);
                    } else {
                        self.reset_x(mode);
                    }
                } else {
                    self.state.x = self.registers[regs::CUR_X] as usize;
                    self.state.y = self.registers[regs::CUR_Y] as usize;
                }
            }

            regs::POWER_CONTROL7 => {
                self.registers[reg] = value & mask::POWER_CONTROL7;
            }

            regs::FRAME_RATE_COLOR_CONTROL => {
                self.registers[reg] = value & mask::FRAME_RATE_COLOR_CONTROL;
                self.panic_mode = false;
                match FRAME_RATES.get((value & 0x000F) as usize) {
                    Some(&rate) => self.frame_rate = rate,
                    None => self.panic_mode = true,
                }
                self.set_line_time();
            }

            regs::GAMMA_CONTROL1
            | regs::GAMMA_CONTROL2
            | regs::GAMMA_CONTROL3
            | regs::GAMMA_CONTROL4
            | regs::GAMMA_CONTROL6
            | regs::GAMMA_CONTROL7
            | regs::GAMMA_CONTROL8
            | regs::GAMMA_CONTROL9 => {
                self.registers[reg] = value & mask::GAMMA_CONTROL;
            }

            regs::GAMMA_CONTROL5 | regs::GAMMA_CONTROL10 => {
                self.registers[reg] = value & mask::GAMMA_CONTROL_5_10;
            }

            regs::WINDOW_HORZ_START => {
                self.registers[reg] = value & mask::WINDOW_HORZ;
                if mode & entry::ORG != 0 && mode & entry::COL_INC != 0 {
                    self.state.y = self.registers[reg] as usize;
                }
            }

            regs::WINDOW_HORZ_END => {
                self.registers[reg] = value & mask::WINDOW_HORZ;
                if mode & entry::ORG != 0 && mode & entry::COL_INC == 0 {
                    self.state.y = self.registers[reg] as usize;
                }
            }

            regs::WINDOW_VERT_START => {
                self.registers[reg] = value & mask::WINDOW_VERT;
                if mode & entry::ORG != 0 && mode & entry::ROW_INC != 0 {
                    self.state.x = self.registers[reg] as usize;
                }
            }

            regs::WINDOW_VERT_END => {
                self.registers[reg] = value & mask::WINDOW_VERT;
                if mode & entry::ORG != 0 && mode & entry::ROW_INC == 0 {
                    self.state.x = self.registers[reg] as usize;
                }
            }

            regs::GATE_SCAN_CONTROL => {
                self.registers[reg] = value & mask::GATE_SCAN_CONTROL;
            }

            regs::BASE_IMAGE_DISPLAY_CONTROL => {
                self.registers[reg] = value & mask::BASE_IMAGE_DISPLAY_CONTROL;
            }

            regs::VERTICAL_SCROLL_CONTROL => {
                self.state.z = (value & mask::VERTICAL_SCROLL_CONTROL) as usize;
                self.registers[reg] = self.state.z as u16;
            }

            regs::PARTIAL_IMAGE1_POS
            | regs::PARTIAL_IMAGE1_START
            | regs::PARTIAL_IMAGE1_END
            | regs::PARTIAL_IMAGE2_POS
            | regs::PARTIAL_IMAGE2_START
            | regs::PARTIAL_IMAGE2_END => {
                self.registers[reg] = value & mask::PARTIAL_IMAGE;
            }

            regs::PANEL_INTERFACE_CONTROL1 => {
                self.registers[reg] = value & mask::PANEL_INTERFACE_CONTROL1;
                self.clocks_per_line = (value & 0x00FF) as u32;
                match value >> 8 {
                    0 => self.clock_divider = 1,
                    1 => self.clock_divider = 2,
                    2 => self.clock_divider = 4,
                    3 => self.clock_divider = 8,
                    _ => {}
                }
                self.set_line_time();
            }

            regs::PANEL_INTERFACE_CONTROL2 => {
                self.registers[reg] = value & mask::PANEL_INTERFACE_CONTROL2;
            }

            regs::PANEL_INTERFACE_CONTROL4 => {
                self.registers[reg] = value & mask::PANEL_INTERFACE_CONTROL4;
            }

            regs::PANEL_INTERFACE_CONTROL5 => {
                self.registers[reg] = value & mask::PANEL_INTERFACE_CONTROL5;
            }

            regs::OTP_VCM_PROGRAMMING_CONTROL => {
                self.registers[reg] = value & mask::OTP_VCM_PROGRAMMING_CONTROL;
            }

            regs::OTP_VCM_STATUS_AND_ENABLE => {
                self.registers[reg] = value & mask::OTP_VCM_STATUS_AND_ENABLE;
            }

            regs::OTP_PROGRAMMING_ID_KEY => {
                self.registers[reg] = value & mask::OTP_PROGRAMMING_ID_KEY;
            }

            regs::DEEP_STAND_BY_MODE_CONTROL => {
                self.registers[reg] = value & mask::DEEP_STAND_BY_MODE_CONTROL;
            }

            // Undefined addresses store the raw value with no side effects
            _ => self.registers[reg] = value,
        }
    }

    /// Snapshots the raw frame and notifies the listener.
    pub fn enqueue(&mut self) {
        self.queued.copy_from_slice(&self.display);
        self.fire_update();
    }

    fn fire_update(&mut self) {
        if let Some(listener) = &self.listener {
            let update = FrameUpdate {
                active: self.state.active,
                contrast: self.state.contrast,
                pixels: self.compose_image(),
            };
            let _ = listener.send(update);
        }
    }

    /// Packed 24-bit pixel at the cursor, channel order per the BGR flag.
    pub fn read_pixel(&self) -> u32 {
        let x = self.state.x % COLOR_LCD_WIDTH;
        let y = self.state.y % COLOR_LCD_HEIGHT;
        let ptr = pixel_offset(x, y);
        if self.reg_mask(regs::ENTRY_MODE, entry::BGR) == 0 {
            (self.display[ptr] as u32) << 16
                | (self.display[ptr + 1] as u32) << 8
                | self.display[ptr + 2] as u32
        } else {
            (self.display[ptr + 2] as u32) << 16
                | (self.display[ptr + 1] as u32) << 8
                | self.display[ptr] as u32
        }
    }

    fn write_pixel(&mut self, red: u8, green: u8, blue: u8) {
        let x = self.state.x % COLOR_LCD_WIDTH;
        let mut y = self.state.y % COLOR_LCD_HEIGHT;

        if self.reg_mask(regs::DRIVER_OUTPUT_CONTROL1, drv::FLIP_COLS) != 0 {
            y = COLOR_LCD_HEIGHT - y - 1;
        }

        let ptr = pixel_offset(x, y);
        if self.reg_mask(regs::ENTRY_MODE, entry::BGR) == 0 {
            self.display[ptr] = red & 0x3F;
            self.display[ptr + 1] = green & 0x3F;
            self.display[ptr + 2] = blue & 0x3F;
        } else {
            self.display[ptr + 2] = red & 0x3F;
            self.display[ptr + 1] = green & 0x3F;
            self.display[ptr] = blue & 0x3F;
        }

        if self.reg_mask(regs::ENTRY_MODE, entry::CUR_DIR) == 0 {
            self.update_y(true);
        } else {
            self.update_x(true);
        }
    }

    /// Decodes the accumulated 18-bit GRAM word (packed or unpacked form).
    pub fn write_pixel18(&mut self) {
        let (red, green, blue) = if self.reg_mask(regs::ENTRY_MODE, entry::UNPACKED) == 0 {
            let pixel = self.write_buffer & 0x3FFFF;
            (
                ((pixel >> 12) & 0x3F) as u8,
                ((pixel >> 6) & 0x3F) as u8,
                (pixel & 0x3F) as u8,
            )
        } else {
            let pixel = self.write_buffer & 0xFCFCFC;
            (
                ((pixel >> 18) & 0x3F) as u8,
                ((pixel >> 10) & 0x3F) as u8,
                ((pixel >> 2) & 0x3F) as u8,
            )
        };
        self.write_pixel(red, green, blue);
    }

    /// Decodes a 5-6-5 GRAM word, widening red/blue by replicating the
    /// adjacent significant bit.
    pub fn write_pixel16(&mut self) {
        let pixel = self.write_buffer;
        let red_bit = (pixel >> 15) & 1;
        let blue_bit = (pixel >> 4) & 1;

        let red = (((pixel >> 10) | red_bit) & 0x3F) as u8;
        let green = ((pixel >> 5) & 0x3F) as u8;
        let blue = (((pixel << 1) | blue_bit) & 0x3F) as u8;
        self.write_pixel(red, green, blue);
    }

    fn update_y(&mut self, should_update: bool) {
        if self.reg_mask(regs::ENTRY_MODE, entry::ROW_INC) == 0 {
            if self.state.y > self.registers[regs::WINDOW_HORZ_START] as usize {
                self.state.y -= 1;
                return;
            }
            self.state.y = self.registers[regs::WINDOW_HORZ_END] as usize;
        } else {
            if self.state.y < self.registers[regs::WINDOW_HORZ_END] as usize {
                self.state.y += 1;
                return;
            }
            self.state.y = self.registers[regs::WINDOW_HORZ_START] as usize;
        }

        // Carried past the window bound: step the other axis
        if should_update {
            self.update_x(false);
        }
    }

    fn update_x(&mut self, should_update: bool) {
        if self.reg_mask(regs::ENTRY_MODE, entry::COL_INC) == 0 {
            if self.state.x > self.registers[regs::WINDOW_VERT_START] as usize {
                self.state.x -= 1;
                return;
            }
            self.state.x = self.registers[regs::WINDOW_VERT_END] as usize;
        } else {
            if self.state.x < self.registers[regs::WINDOW_VERT_END] as usize {
                self.state.x += 1;
                return;
            }
            self.state.x = self.registers[regs::WINDOW_VERT_START] as usize;
        }

        if should_update {
            self.update_y(false);
        }
    }

    fn draw_row_floating(dest: &mut [u8], start: usize, size: usize) {
        dest[start..start + size].fill(0xFF);
    }

    fn draw_nondisplay_area(dest: &mut [u8], start: usize, size: usize, color: u8) {
        dest[start..start + size].fill(color);
    }

    fn draw_row_image(&self, dest: &mut [u8], dest_start: usize, src: &[u8], src_start: usize, size: usize) {
        let level_invert = self.reg_mask(regs::BASE_IMAGE_DISPLAY_CONTROL, base_img::LEVEL_INVERT) == 0;
        let color8 = self.reg_mask(regs::DISPLAY_CONTROL1, disp1::COLOR8) != 0;

        // The backlight gate is all-or-nothing: opaque except at the top level
        let alpha: u32 = if self.state.contrast == MAX_BACKLIGHT_LEVEL - 1 { 0 } else { 100 };
        let bits = if color8 { 1 } else { 6 };

        if level_invert {
            let flip_rows = self.reg_mask(regs::GATE_SCAN_CONTROL, gate::SCAN_DIR) != 0;
            for i in (0..size).step_by(3) {
                let base = if flip_rows {
                    src_start + size - 3 - i
                } else {
                    src_start + i
                };
                let mut r = src[base] ^ 0x3F;
                let mut g = src[base + 1] ^ 0x3F;
                let mut b = src[base + 2] ^ 0x3F;
                if color8 {
                    r >>= 5;
                    g >>= 5;
                    b >>= 5;
                }
                dest[dest_start + i] = (tru_color(r as u32, bits) as u32 * alpha / 100) as u8;
                dest[dest_start + i + 1] = (tru_color(g as u32, bits) as u32 * alpha / 100) as u8;
                dest[dest_start + i + 2] = (tru_color(b as u32, bits) as u32 * alpha / 100) as u8;
            }
        } else {
            for i in 0..size {
                let val = if color8 { src[src_start + i] >> 5 } else { src[src_start + i] };
                dest[dest_start + i] = (tru_color(val as u32, bits) as u32 * alpha / 100) as u8;
            }
        }
    }

    /// Draws an overlay whose source offset may wrap past the row end, in
    /// which case it is split and drawn in two pieces.
    fn draw_partial_image(
        &self,
        dest: &mut [u8],
        dest_start: usize,
        src: &[u8],
        offset: usize,
        size: usize,
    ) {
        let mut offset = offset;
        if offset > ROW_BYTES {
            offset %= ROW_BYTES;
        }

        if offset + size > ROW_BYTES {
            let right_size = ROW_BYTES - offset;
            let left_size = size - right_size;
            let flip_rows = self.reg_mask(regs::GATE_SCAN_CONTROL, gate::SCAN_DIR) != 0;

            if flip_rows {
                self.draw_row_image(dest, dest_start + left_size, src, offset, right_size);
                self.draw_row_image(dest, dest_start, src, 0, left_size);
            } else {
                self.draw_row_image(dest, dest_start, src, offset, right_size);
                self.draw_row_image(dest, dest_start + right_size, src, 0, left_size);
            }
        } else {
            self.draw_row_image(dest, dest_start, src, offset, size);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_row(
        &self,
        dest: &mut [u8],
        src: &[u8],
        start_x: usize,
        display_width: usize,
        imgpos1: usize,
        imgoffs1: usize,
        imgsize1: usize,
        imgpos2: usize,
        imgoffs2: usize,
        imgsize2: usize,
    ) {
        let mut interlace_buf = [0u8; ROW_BYTES];
        let interlaced = self.reg_mask(regs::DRIVER_OUTPUT_CONTROL1, drv::INTERLACED) != 0;

        let ndl_color = if self.reg_mask(regs::BASE_IMAGE_DISPLAY_CONTROL, base_img::NDL) != 0 {
            tru_color(0x00, 6)
        } else {
            tru_color(0x3F, 6)
        };

        {
            let optr: &mut [u8] = if interlaced { &mut interlace_buf } else { &mut *dest };
            let mut pos = 0;

            if start_x != 0 {
                if interlaced {
                    Self::draw_nondisplay_area(optr, pos, start_x, 0);
                } else {
                    Self::draw_row_floating(optr, pos, start_x);
                }
                pos += start_x;
            }

            let n = ROW_BYTES - start_x - display_width;
            if imgsize1 != n && imgsize2 != n {
                Self::draw_nondisplay_area(optr, pos, n, ndl_color);
            }

            if imgsize1 != 0 {
                self.draw_partial_image(optr, pos + imgpos1, src, imgoffs1, imgsize1);
            }

            if imgsize2 != 0 {
                self.draw_partial_image(optr, pos + imgpos2, src, imgoffs2, imgsize2);
            }

            pos += n;

            if display_width != 0 {
                if interlaced {
                    Self::draw_nondisplay_area(optr, pos, display_width, 0);
                } else {
                    Self::draw_row_floating(optr, pos, display_width);
                }
            }
        }

        if interlaced {
            // De-interleave: alternate pixels come from the top and bottom
            // halves of the assembled row
            let half = ROW_BYTES / 2;
            let mut dest_pos = 0;
            for i in 0..COLOR_LCD_WIDTH / 2 {
                let top = i * 3;
                dest[dest_pos..dest_pos + 3].copy_from_slice(&interlace_buf[top..top + 3]);
                dest[dest_pos + 3..dest_pos + 6]
                    .copy_from_slice(&interlace_buf[top + half..top + half + 3]);
                dest_pos += 6;
            }
        }
    }
}

impl DisplayController for ColorLcd {
    fn write_command(&mut self, value: u8) {
        self.current_register = (self.current_register << 8) | value as u16;
    }

    fn write_data(&mut self, value: u8) {
        self.write_buffer = (self.write_buffer << 8) | value as u32;
        self.write_step += 1;
        let reg = (self.current_register & 0xFF) as usize;

        if reg == regs::GRAM {
            let steps = if self.reg_mask(regs::ENTRY_MODE, entry::EIGHTEEN_BIT) != 0 { 3 } else { 2 };
            if self.write_step >= steps {
                self.write_step = 0;
                if steps == 3 {
                    self.write_pixel18();
                } else {
                    self.write_pixel16();
                }
                self.write_buffer = 0;
            }
        } else if self.write_step >= 2 {
            let value16 = (self.write_buffer & 0xFFFF) as u16;
            self.write_step = 0;
            self.write_buffer = 0;
            self.set_register(reg as u16, value16);
        }
    }

    fn read_command(&mut self) -> u8 {
        0
    }

    fn read_data(&mut self) -> u8 {
        let reg = (self.current_register & 0xFF) as usize;
        if self.read_step == 0 {
            self.read_step = 1;
            self.read_buffer = if reg == regs::GRAM {
                self.read_pixel()
            } else {
                (self.registers[reg] as u32) << 8
            };
            (self.read_buffer >> 16) as u8
        } else {
            self.read_step = 0;
            (self.read_buffer >> 8) as u8
        }
    }

    fn reset(&mut self) {
        self.state.reset();
        self.current_register = 0;
        self.registers = [0; 0x100];
        self.display.fill(0);
        self.queued.fill(0);
        self.read_buffer = 0;
        self.write_buffer = 0;
        self.read_step = 0;
        self.write_step = 0;
        self.panic_mode = false;

        self.state.width = COLOR_LCD_WIDTH;
        self.state.display_width = COLOR_LCD_WIDTH;
        self.state.height = COLOR_LCD_HEIGHT;

        self.display_lines = COLOR_LCD_WIDTH as u32;
        self.frame_rate = 69;
        self.back_porch = 2;
        self.front_porch = 2;
        self.clocks_per_line = 16;
        self.clock_divider = 1;
        self.backlight_active = true;
        self.set_line_time();

        self.registers[regs::DRIVER_CODE] = DRIVER_CODE_VER;
        self.registers[regs::DISPLAY_CONTROL2] = 0x0202;
        self.registers[regs::FRAME_RATE_COLOR_CONTROL] = 0x000B;
        self.registers[regs::GATE_SCAN_CONTROL] = 0x2700;
        self.registers[regs::PANEL_INTERFACE_CONTROL1] = 0x0010;
        self.registers[regs::PANEL_INTERFACE_CONTROL2] = 0x0600;
        self.registers[regs::PANEL_INTERFACE_CONTROL4] = 0x0600;
        self.registers[regs::PANEL_INTERFACE_CONTROL5] = 0x0C00;
    }

    fn compose_image(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; COLOR_LCD_DISPLAY_SIZE];

        if !self.state.active || !self.backlight_active {
            return buffer;
        }

        if self.panic_mode {
            // Diagnostic pattern: white in every other gate line
            for y in 0..COLOR_LCD_HEIGHT {
                for x in (0..COLOR_LCD_WIDTH).step_by(2) {
                    let ptr = pixel_offset(x, y);
                    buffer[ptr..ptr + 3].fill(0xFF);
                }
            }
            return buffer;
        }

        let mut start_x = (self.reg_mask(regs::GATE_SCAN_CONTROL, gate::BASE_START) as usize) << 3;
        let mut pixel_width =
            (((self.reg_mask(regs::GATE_SCAN_CONTROL, gate::BASE_NLINES) as usize) >> 8) + 1) << 3;

        if start_x > COLOR_LCD_WIDTH {
            start_x = COLOR_LCD_WIDTH;
        }
        if pixel_width > COLOR_LCD_WIDTH - start_x {
            pixel_width = COLOR_LCD_WIDTH - start_x;
        }

        let mut display_width = (COLOR_LCD_WIDTH - (start_x + pixel_width)) * COLOR_LCD_DEPTH;
        let mut start_x = start_x * COLOR_LCD_DEPTH;

        let mut p1pos;
        let p1start;
        let mut p1width;
        let mut p2pos;
        let p2start;
        let mut p2width;

        if self.reg_mask(regs::DISPLAY_CONTROL1, disp1::BASEE) == 0 {
            if self.reg_mask(regs::DISPLAY_CONTROL1, disp1::SHOW_PARTIAL1) == 0 {
                p1pos = 0;
                p1start = 0;
                p1width = 0;
            } else {
                p1pos = self.registers[regs::PARTIAL_IMAGE1_POS] as usize % COLOR_LCD_WIDTH;
                p1start = self.registers[regs::PARTIAL_IMAGE1_START] as usize % COLOR_LCD_WIDTH;
                let p1end = self.registers[regs::PARTIAL_IMAGE1_END] as usize % COLOR_LCD_WIDTH;

                let mut width = p1end as isize + 1 - p1start as isize;
                if width < 0 {
                    width += COLOR_LCD_WIDTH as isize;
                }
                p1width = width as usize;

                if p1pos > pixel_width {
                    p1pos = pixel_width;
                }
                if p1width > pixel_width - p1pos {
                    p1width = pixel_width - p1pos;
                }
            }

            if self.reg_mask(regs::DISPLAY_CONTROL1, disp1::SHOW_PARTIAL2) == 0 {
                p2pos = 0;
                p2start = 0;
                p2width = 0;
            } else {
                p2pos = self.registers[regs::PARTIAL_IMAGE2_POS] as usize % COLOR_LCD_WIDTH;
                p2start = self.registers[regs::PARTIAL_IMAGE2_START] as usize % COLOR_LCD_WIDTH;
                let p2end = self.registers[regs::PARTIAL_IMAGE2_END] as usize % COLOR_LCD_WIDTH;

                let mut width = p2end as isize + 1 - p2start as isize;
                if width < 0 {
                    width += COLOR_LCD_WIDTH as isize;
                }
                p2width = width as usize;

                if p2pos > pixel_width {
                    p2pos = pixel_width;
                }
                if p2width > pixel_width - p2pos {
                    p2width = pixel_width - p2pos;
                }
            }
        } else {
            // Base image enabled: the scan window shows the base frame,
            // scrolled by Z when scroll is enabled
            p2pos = 0;
            p2width = pixel_width;
            p2start = if self.reg_mask(regs::BASE_IMAGE_DISPLAY_CONTROL, base_img::SCROLL_ENABLED) == 0 {
                0
            } else {
                self.state.z
            };

            p1pos = 0;
            p1start = 0;
            p1width = 0;
        }

        let flip_rows = self.reg_mask(regs::GATE_SCAN_CONTROL, gate::SCAN_DIR) != 0;
        if flip_rows {
            std::mem::swap(&mut start_x, &mut display_width);
            p1pos = COLOR_LCD_WIDTH - (p1pos + p1width);
            p2pos = COLOR_LCD_WIDTH - (p2pos + p2width);
        }

        // Overlay 2 is composited before overlay 1
        let imgpos1 = p2pos * COLOR_LCD_DEPTH;
        let imgoffs1 = p2start * COLOR_LCD_DEPTH;
        let imgsize1 = p2width * COLOR_LCD_DEPTH;
        let imgpos2 = p1pos * COLOR_LCD_DEPTH;
        let imgoffs2 = p1start * COLOR_LCD_DEPTH;
        let imgsize2 = p1width * COLOR_LCD_DEPTH;

        for row in 0..COLOR_LCD_HEIGHT {
            let offset = row * ROW_BYTES;
            self.draw_row(
                &mut buffer[offset..offset + ROW_BYTES],
                &self.queued[offset..offset + ROW_BYTES],
                start_x,
                display_width,
                imgpos1,
                imgoffs1,
                imgsize1,
                imgpos2,
                imgoffs2,
                imgsize2,
            );
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

impl Default for ColorLcd {
    fn default() -> Self {
        Self::new(None)
    }
}
