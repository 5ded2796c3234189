//! Keypad matrix scanned through a single I/O port.
//!
//! The key matrix is 8 groups by 8 keys. Writing the port selects groups
//! with active-low bits; reading returns the active-low combined state of
//! every key in the selected groups. 0xFF means no key down.

pub const KEY_GROUPS: usize = 8;
pub const KEYS_PER_GROUP: usize = 8;

#[derive(Debug, Clone)]
pub struct Keypad {
    /// Pressed-key bitmap per group, one bit per key, 1 = held
    keys: [u8; KEY_GROUPS],
    /// Last group-select byte written, active low
    group: u8,
    /// ON key line, outside the matrix
    on_pressed: bool,
}

impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [0; KEY_GROUPS],
            group: 0xFF,
            on_pressed: false,
        }
    }

    pub fn reset(&mut self) {
        self.keys = [0; KEY_GROUPS];
        self.group = 0xFF;
        self.on_pressed = false;
    }

    /// Selects scan groups; a cleared bit enables that group.
    pub fn write(&mut self, value: u8) {
        self.group = value;
    }

    /// Combined active-low key state across every enabled group.
    pub fn read(&self) -> u8 {
        let mut result = 0xFF;
        for (bit, &keys) in self.keys.iter().enumerate() {
            if self.group & (1 << bit) == 0 {
                result &= !keys;
            }
        }
        result
    }

    pub fn key_down(&mut self, group: usize, bit: usize) {
        if group < KEY_GROUPS && bit < KEYS_PER_GROUP {
            self.keys[group] |= 1 << bit;
        }
    }

    pub fn key_up(&mut self, group: usize, bit: usize) {
        if group < KEY_GROUPS && bit < KEYS_PER_GROUP {
            self.keys[group] &= !(1 << bit);
        }
    }

    pub fn set_on_pressed(&mut self, pressed: bool) {
        self.on_pressed = pressed;
    }

    pub fn on_pressed(&self) -> bool {
        self.on_pressed
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}
