//! SE-line auxiliary hardware: memory-delay ports, crystal timers,
//! real-time clock, USB status registers, the MD5 accelerator, and GPIO.
//!
//! These are small register files hanging off the port map of the
//! SE/84+ models. None of them schedules anything on its own; timers
//! expose rate and countdown state for an external pacer, and the clock
//! is fed elapsed wall-clock seconds at read time.

/// Crystal reference feeding the countdown timers, Hz
pub const CRYSTAL_HZ: f64 = 32768.0;

/// Memory wait-state configuration, ports 0x29-0x2F.
///
/// One enable register per CPU speed (0x29-0x2C) plus a shared select
/// register (0x2E). The decoded per-access penalties land in
/// [`MemDelays`] and are applied to the memory map by the port registry.
#[derive(Debug, Clone, Default)]
pub struct Delay {
    pub regs: [u8; 7],
}

/// Extra t-states per access class, each 0 or 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemDelays {
    pub read_op_flash: u32,
    pub read_nop_flash: u32,
    pub write_flash: u32,
    pub read_op_ram: u32,
    pub read_nop_ram: u32,
    pub write_ram: u32,
}

impl Delay {
    pub fn new() -> Self {
        Delay::default()
    }

    pub fn write(&mut self, index: usize, value: u8) {
        if index < self.regs.len() {
            self.regs[index] = value;
        }
    }

    pub fn read(&self, index: usize) -> u8 {
        if index < self.regs.len() {
            self.regs[index]
        } else {
            0
        }
    }

    /// Decode for the current CPU speed (0-3). The enable register for
    /// that speed gates flash (bit 0) and RAM (bit 1) penalties; the
    /// select register picks which access classes pay them.
    pub fn mem_delays(&self, cpu_speed: usize) -> MemDelays {
        let enable = self.regs[cpu_speed & 3];
        let select = self.regs[0x2E - 0x29];

        let flash = enable & 1 != 0;
        let ram = enable & 2 != 0;

        MemDelays {
            read_op_flash: (flash && select & 0x01 != 0) as u32,
            read_nop_flash: (flash && select & 0x02 != 0) as u32,
            write_flash: (flash && select & 0x04 != 0) as u32,
            read_op_ram: (ram && select & 0x10 != 0) as u32,
            read_nop_ram: (ram && select & 0x20 != 0) as u32,
            write_ram: (ram && select & 0x40 != 0) as u32,
        }
    }
}

/// One crystal countdown timer (three per calculator, ports
/// 0x30-0x32 / 0x33-0x35 / 0x36-0x38: clock, loop, count).
#[derive(Debug, Clone, Default)]
pub struct CrystalTimer {
    pub clock: u8,
    pub count: u8,
    pub max: u8,
    pub divisor: f64,
    /// Restart on underflow
    pub looping: bool,
    /// Raise the interrupt latch on underflow
    pub generate: bool,
    pub underflow: bool,
    pub interrupt: bool,
    pub active: bool,
}

impl CrystalTimer {
    /// Clock-source write: bits 7-6 pick the source, the low bits the
    /// divider. Source 0 stops the timer; source 1 divides the 32 kHz
    /// crystal; sources 2-3 divide the CPU clock by a power of two
    /// scanned from bit 5 down.
    pub fn write_clock(&mut self, value: u8) {
        self.clock = value;
        match (value >> 6) & 3 {
            0 => {
                self.divisor = 0.0;
                self.active = false;
            }
            1 => {
                self.divisor = match value & 0x07 {
                    0 => 3.0,
                    1 => 33.0,
                    2 => 328.0,
                    3 => 3277.0,
                    4 => 1.0,
                    5 => 16.0,
                    6 => 256.0,
                    _ => 4096.0,
                };
            }
            _ => {
                let mut divisor = 64.0;
                let mut bit = 0x20;
                for _ in 0..6 {
                    if value & bit != 0 {
                        break;
                    }
                    divisor /= 2.0;
                    bit >>= 1;
                }
                self.divisor = divisor;
            }
        }
    }

    /// Loop-control write: bit 0 loop, bit 1 interrupt generation.
    /// Clears the underflow and interrupt latches.
    pub fn write_loop(&mut self, value: u8) {
        self.looping = value & 1 != 0;
        self.generate = value & 2 != 0;
        self.underflow = false;
        self.interrupt = false;
    }

    pub fn read_loop(&self) -> u8 {
        (self.looping as u8) | (self.generate as u8) << 1 | (self.underflow as u8) << 2
    }

    /// Counter write arms the timer (if a clock source is selected)
    /// and sets the reload value.
    pub fn write_count(&mut self, value: u8) {
        self.count = value;
        self.max = value;
        self.active = self.divisor != 0.0;
    }

    pub fn read_count(&self) -> u8 {
        self.count
    }

    /// Tick rate for the external pacer; 0 while stopped. Sources 2-3
    /// are CPU-clock relative, so the caller scales by the CPU rate.
    pub fn frequency(&self) -> f64 {
        if !self.active || self.divisor == 0.0 {
            return 0.0;
        }
        CRYSTAL_HZ / self.divisor
    }

    /// One countdown step, with underflow reload and latch semantics.
    pub fn tick(&mut self) {
        if !self.active {
            return;
        }
        if self.count > 0 {
            self.count -= 1;
            return;
        }
        // Decrement past zero: underflow
        self.underflow = true;
        if self.generate {
            self.interrupt = true;
        }
        if self.looping {
            self.count = self.max;
        } else {
            self.active = false;
        }
    }
}

/// The three crystal timers as a group.
#[derive(Debug, Clone, Default)]
pub struct Crystal {
    pub timers: [CrystalTimer; 3],
}

impl Crystal {
    pub fn new() -> Self {
        Crystal::default()
    }

    /// Interrupt skip factor for the shared timer interrupt port:
    /// 0 while every timer is stopped, 1 once any has a clock source.
    pub fn skip_factor(&self) -> u32 {
        let sources = self
            .timers
            .iter()
            .fold(0u8, |acc, timer| acc | ((timer.clock >> 6) & 3));
        if sources == 0 {
            0
        } else {
            1
        }
    }

    pub fn interrupt_pending(&self) -> bool {
        self.timers.iter().any(|timer| timer.interrupt)
    }
}

/// Real-time clock, ports 0x40-0x48. A 32-bit seconds counter: four
/// set-value byte ports, an enable port that latches the set value into
/// the running base, and four read ports returning the current count.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    pub enable: u8,
    set: u32,
    base: u32,
    /// Elapsed-seconds stamp taken when the clock was started
    lasttime: f64,
}

impl Clock {
    pub fn new() -> Self {
        Clock::default()
    }

    /// Bit 0 loads the set value into the base; bit 1 runs the counter.
    pub fn write_enable(&mut self, value: u8, elapsed: f64) {
        self.enable = value & 3;
        if value & 1 != 0 {
            self.base = self.set;
        }
        if value & 2 != 0 {
            self.lasttime = elapsed;
        }
    }

    pub fn read_enable(&self) -> u8 {
        self.enable
    }

    /// Set-value byte write, `index` 0-3 from port 0x41-0x44.
    pub fn write_set(&mut self, index: usize, value: u8) {
        let shift = (index & 3) * 8;
        self.set = (self.set & !(0xFF << shift)) | ((value as u32) << shift);
    }

    pub fn read_set(&self, index: usize) -> u8 {
        (self.set >> ((index & 3) * 8)) as u8
    }

    /// Current-count byte read, `index` 0-3 from port 0x45-0x48.
    pub fn read_time(&self, index: usize, elapsed: f64) -> u8 {
        let current = if self.enable & 2 != 0 {
            self.base.wrapping_add((elapsed - self.lasttime) as u32)
        } else {
            self.base
        };
        (current >> ((index & 3) * 8)) as u8
    }
}

/// USB controller status registers. Only the pieces the OS polls at
/// boot are modeled: line state, event latches and their mask, and the
/// interrupt flags derived from them.
#[derive(Debug, Clone)]
pub struct Usb {
    pub line_state: u8,
    pub events: u8,
    pub event_mask: u8,
    pub dev_control: u8,
    pub protocol: u8,
    pub line_interrupt: bool,
    pub protocol_interrupt: bool,
}

/// VBus-high line bit in the line-state register
pub const VBUS_HIGH_MASK: u8 = 0x40;

impl Usb {
    pub fn new() -> Self {
        Usb {
            line_state: 0xA5,
            events: 0x50,
            event_mask: 0,
            dev_control: 0,
            protocol: 0,
            line_interrupt: false,
            protocol_interrupt: false,
        }
    }

    pub fn read_line_state(&self) -> u8 {
        self.line_state
    }

    pub fn read_events(&self) -> u8 {
        self.events
    }

    /// Writing the event register clears the written latches.
    pub fn write_events(&mut self, value: u8) {
        self.events &= !value;
        if self.events & self.event_mask == 0 {
            self.line_interrupt = false;
        }
    }

    pub fn write_event_mask(&mut self, value: u8) {
        self.event_mask = value;
        self.line_interrupt = self.events & self.event_mask != 0;
    }

    /// Interrupt status byte: line and protocol causes.
    pub fn read_interrupt_status(&self) -> u8 {
        (self.line_interrupt as u8) | (self.protocol_interrupt as u8) << 1
    }

    pub fn interrupt_pending(&self) -> bool {
        self.line_interrupt || self.protocol_interrupt
    }
}

impl Default for Usb {
    fn default() -> Self {
        Self::new()
    }
}

/// MD5 round accelerator, ports 0x18-0x1F.
///
/// Six 32-bit operand registers (a, b, c, d, x, ac) are filled a byte
/// at a time, each write shifting in from the top. Port 0x1E sets the
/// rotate amount, port 0x1F the round function. Reads return bytes of
/// the computed round value `rotl(a + f(b,c,d) + x + ac, s) + b`.
#[derive(Debug, Clone, Default)]
pub struct Md5 {
    pub regs: [u32; 6],
    pub shift: u8,
    pub mode: u8,
}

impl Md5 {
    pub fn new() -> Self {
        Md5::default()
    }

    pub fn write_reg(&mut self, index: usize, value: u8) {
        if let Some(reg) = self.regs.get_mut(index) {
            *reg = (*reg >> 8) | ((value as u32) << 24);
        }
    }

    pub fn write_shift(&mut self, value: u8) {
        self.shift = value & 0x1F;
    }

    pub fn write_mode(&mut self, value: u8) {
        self.mode = value & 3;
    }

    pub fn value(&self) -> u32 {
        let [a, b, c, d, x, ac] = self.regs;
        let f = match self.mode {
            0 => (b & c) | (!b & d),
            1 => (b & d) | (c & !d),
            2 => b ^ c ^ d,
            _ => c ^ (b | !d),
        };
        a.wrapping_add(f)
            .wrapping_add(x)
            .wrapping_add(ac)
            .rotate_left(self.shift as u32)
            .wrapping_add(b)
    }

    /// Result byte as seen from operand port `index`; the low four
    /// ports select the four result bytes.
    pub fn read_byte(&self, index: usize) -> u8 {
        (self.value() >> ((index & 3) * 8)) as u8
    }
}

/// The SE auxiliary block as wired at bring-up.
#[derive(Debug, Clone, Default)]
pub struct SeAux {
    pub delay: Delay,
    pub crystal: Crystal,
    pub clock: Clock,
    pub usb: Usb,
    pub md5: Md5,
    pub gpio: u8,
}

/// GPIO bit routed to the color LCD backlight on the 84+CSE
pub const GPIO_BACKLIGHT_BIT: u8 = 1 << 5;

impl SeAux {
    pub fn new() -> Self {
        SeAux::default()
    }

    pub fn write_gpio(&mut self, value: u8) {
        self.gpio = value;
    }

    pub fn backlight_on(&self) -> bool {
        self.gpio & GPIO_BACKLIGHT_BIT == 0
    }
}
