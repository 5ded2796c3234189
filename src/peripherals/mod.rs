//! Peripheral register files and display engines.
//!
//! Everything here is a leaf driven through the port registry:
//! - Display engines (monochrome multi-shade and color driver chip)
//! - Keypad matrix
//! - Link port and SE link assist
//! - Interrupt-timer controller
//! - SE auxiliary block (crystal timers, clock, delay ports, USB, MD5)

pub mod colorlcd;
pub mod display;
pub mod keypad;
pub mod lcd;
pub mod link;
pub mod seaux;
pub mod stdint;

pub use colorlcd::{ColorLcd, COLOR_LCD_HEIGHT, COLOR_LCD_WIDTH};
pub use display::{CursorMode, DisplayController, DisplayState, FrameSender, FrameUpdate};
pub use keypad::{Keypad, KEYS_PER_GROUP, KEY_GROUPS};
pub use lcd::{MonoLcd, LCD_DISPLAY_WIDTH, LCD_HEIGHT};
pub use link::{LinkAssist, LinkPort};
pub use seaux::SeAux;
pub use stdint::StdInt;
