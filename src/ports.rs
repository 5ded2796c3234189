//! Per-model device/port registry.
//!
//! `bring_up` constructs every peripheral for a calculator model, binds
//! each to its I/O port number, and declares which ports feed CPU
//! interrupts. Wiring is the only thing that differs across models;
//! the controller logic is shared.
//!
//! Dispatch is a 256-entry table of `PortKind` tags built once at
//! bring-up and immutable afterward. Reads from unbound ports return
//! the floating-bus value 0xFF; writes to them are logged and dropped.

use anyhow::bail;
use log::debug;

use crate::banks::MemoryMap;
use crate::model::CalcModel;
use crate::peripherals::colorlcd::ColorLcd;
use crate::peripherals::display::{DisplayController, FrameSender};
use crate::peripherals::keypad::Keypad;
use crate::peripherals::lcd::MonoLcd;
use crate::peripherals::link::{LinkAssist, LinkPort};
use crate::peripherals::seaux::{SeAux, VBUS_HIGH_MASK};
use crate::peripherals::stdint::{StdInt, TIMER_FREQ_83, TIMER_FREQ_SE};

/// What a port number is bound to. Payloads index into multi-port
/// register files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Unbound,
    Link,
    Keypad,
    Status,
    IntMask,
    IntStatus,
    RamBank,
    MemBankA,
    MemBankB,
    MemBankAHigh,
    MemBankBHigh,
    LcdCommand,
    LcdData,
    FlashLock,
    ModelId,
    /// TI-83 whole-map bank control
    BankControl83,
    LinkAssistEnable,
    LinkAssistStatus,
    LinkAssistBuffer,
    LinkAssistSend,
    Md5Reg(u8),
    Md5Shift,
    Md5Mode,
    CpuSpeed,
    Protected(u8),
    ChunkRemap(u8),
    Delay(u8),
    CrystalClock(u8),
    CrystalLoop(u8),
    CrystalCount(u8),
    Gpio,
    ClockEnable,
    ClockSet(u8),
    ClockRead(u8),
    Usb(u8),
}

/// A port that raises CPU interrupts, with its skip-factor priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptBinding {
    pub port: u8,
    pub skip_factor: u32,
}

/// Either display engine behind the shared controller contract.
#[derive(Debug)]
pub enum Display {
    Mono(MonoLcd),
    Color(ColorLcd),
}

impl Display {
    fn controller(&mut self) -> &mut dyn DisplayController {
        match self {
            Display::Mono(lcd) => lcd,
            Display::Color(lcd) => lcd,
        }
    }

    pub fn compose_image(&self) -> Vec<u8> {
        match self {
            Display::Mono(lcd) => lcd.compose_image(),
            Display::Color(lcd) => lcd.compose_image(),
        }
    }
}

pub struct PortRegistry {
    pub model: CalcModel,
    bindings: [PortKind; 256],
    interrupts: Vec<InterruptBinding>,
    pub display: Display,
    pub keypad: Keypad,
    pub link: LinkPort,
    pub assist: LinkAssist,
    pub stdint: StdInt,
    pub seaux: SeAux,
    pub mem: MemoryMap,
    elapsed: f64,
    cpu_speed: usize,
    ram_bank_port: u8,
    mem_bank_ports: [u8; 2],
    mem_bank_high: [u8; 2],
    bank_control: u8,
}

impl PortRegistry {
    /// Constructs the full peripheral set and port map for a model.
    /// The frame listener receives an owned snapshot on every display
    /// enqueue; `None` makes delivery a no-op.
    pub fn bring_up(model: CalcModel, listener: Option<FrameSender>) -> anyhow::Result<Self> {
        if !model.is_83p_family() && model != CalcModel::Ti83 {
            bail!("unsupported model: {model}");
        }

        let spec = model.spec();
        let display = if model.has_color_lcd() {
            Display::Color(ColorLcd::new(listener))
        } else {
            Display::Mono(MonoLcd::new(listener))
        };

        let freq = if model.has_se_aux() || model == CalcModel::Ti84Plus {
            TIMER_FREQ_SE
        } else {
            TIMER_FREQ_83
        };

        let mut assist = LinkAssist::new();
        if model.has_se_aux() || model == CalcModel::Ti84Plus {
            assist.write_enable(0x80);
        }

        let mut registry = PortRegistry {
            model,
            bindings: [PortKind::Unbound; 256],
            interrupts: Vec::new(),
            display,
            keypad: Keypad::new(),
            link: LinkPort::new(),
            assist,
            stdint: StdInt::new(freq),
            seaux: SeAux::new(),
            mem: MemoryMap::new(spec.flash_pages, spec.ram_pages, spec.flash_version),
            elapsed: 0.0,
            cpu_speed: 0,
            ram_bank_port: 0,
            mem_bank_ports: [0; 2],
            mem_bank_high: [0; 2],
            bank_control: 0,
        };

        match model {
            CalcModel::Ti83 => registry.wire_83(),
            CalcModel::Ti83Plus => registry.wire_83p(),
            _ => registry.wire_83pse(),
        }

        Ok(registry)
    }

    fn wire_common(&mut self) {
        self.bind(0x00, PortKind::Link);
        self.bind(0x01, PortKind::Keypad);
        self.bind(0x03, PortKind::IntMask);
        self.bind(0x04, PortKind::IntStatus);
        self.bind(0x10, PortKind::LcdCommand);
        self.bind(0x11, PortKind::LcdData);

        self.interrupts.push(InterruptBinding { port: 0x00, skip_factor: 1 });
        self.interrupts.push(InterruptBinding { port: 0x03, skip_factor: 8 });
        self.interrupts.push(InterruptBinding { port: 0x11, skip_factor: 128 });
    }

    fn wire_83(&mut self) {
        self.wire_common();
        self.bind(0x02, PortKind::BankControl83);
    }

    fn wire_83p(&mut self) {
        self.wire_common();
        self.bind(0x02, PortKind::Status);
        self.bind(0x05, PortKind::RamBank);
        self.bind(0x06, PortKind::MemBankA);
        self.bind(0x07, PortKind::MemBankB);
        self.bind(0x14, PortKind::FlashLock);
        self.bind(0x15, PortKind::ModelId);

        // Partially-decoded shadows of the system ports
        self.bind(0x21, PortKind::Status);
        self.bind(0x26, PortKind::IntMask);
        self.bind(0x27, PortKind::MemBankB);
    }

    fn wire_83pse(&mut self) {
        self.wire_common();
        self.bind(0x02, PortKind::Status);
        self.bind(0x05, PortKind::RamBank);
        self.bind(0x06, PortKind::MemBankA);
        self.bind(0x07, PortKind::MemBankB);
        self.bind(0x08, PortKind::LinkAssistEnable);
        self.bind(0x09, PortKind::LinkAssistStatus);
        self.bind(0x0A, PortKind::LinkAssistBuffer);
        self.bind(0x0D, PortKind::LinkAssistSend);
        self.bind(0x0E, PortKind::MemBankAHigh);
        self.bind(0x0F, PortKind::MemBankBHigh);
        self.bind(0x14, PortKind::FlashLock);
        self.bind(0x15, PortKind::ModelId);

        for i in 0..6 {
            self.bind(0x18 + i, PortKind::Md5Reg(i));
        }
        self.bind(0x1E, PortKind::Md5Shift);
        self.bind(0x1F, PortKind::Md5Mode);

        self.bind(0x20, PortKind::CpuSpeed);
        for i in 1..7 {
            self.bind(0x20 + i, PortKind::Protected(i));
        }
        self.bind(0x27, PortKind::ChunkRemap(0));
        self.bind(0x28, PortKind::ChunkRemap(1));
        for i in 0..7 {
            self.bind(0x29 + i, PortKind::Delay(i));
        }

        for timer in 0..3 {
            let base = 0x30 + timer * 3;
            self.bind(base, PortKind::CrystalClock(timer));
            self.bind(base + 1, PortKind::CrystalLoop(timer));
            self.bind(base + 2, PortKind::CrystalCount(timer));
        }
        self.bind(0x3A, PortKind::Gpio);

        self.bind(0x40, PortKind::ClockEnable);
        for i in 0..4 {
            self.bind(0x41 + i, PortKind::ClockSet(i));
            self.bind(0x45 + i, PortKind::ClockRead(i));
        }

        for port in [0x4A, 0x4C, 0x4D, 0x54, 0x55, 0x56, 0x57, 0x5B, 0x80] {
            self.bind(port, PortKind::Usb(port));
        }

        self.interrupts.push(InterruptBinding { port: 0x09, skip_factor: 3 });
        self.interrupts.push(InterruptBinding { port: 0x32, skip_factor: 8 });
    }

    fn bind(&mut self, port: u8, kind: PortKind) {
        self.bindings[port as usize] = kind;
    }

    pub fn binding(&self, port: u8) -> PortKind {
        self.bindings[port as usize]
    }

    pub fn interrupts(&self) -> &[InterruptBinding] {
        &self.interrupts
    }

    /// Adjusts the skip factor of an already-declared interrupt port.
    pub fn modify_interrupt(&mut self, port: u8, skip_factor: u32) {
        for binding in &mut self.interrupts {
            if binding.port == port {
                binding.skip_factor = skip_factor;
            }
        }
    }

    /// Feeds monotonic wall-clock seconds; advances the timer latches.
    pub fn set_elapsed(&mut self, elapsed: f64) {
        self.elapsed = elapsed;
        self.stdint.advance(elapsed);
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn cpu_speed(&self) -> usize {
        self.cpu_speed
    }

    /// The ON key sits outside the matrix and feeds the interrupt latch.
    pub fn set_on_key(&mut self, pressed: bool) {
        self.keypad.set_on_pressed(pressed);
        self.stdint.set_on_pressed(pressed);
    }

    /// Composite status byte: battery line, flash-lock state, and the
    /// hardware-revision bits the boot code sniffs.
    fn status_byte(&self) -> u8 {
        let mut status = 0x01;
        if !self.mem.flash_locked() {
            status |= 0x04;
        }
        if self.model != CalcModel::Ti83Plus {
            status |= 0xE0;
        }
        status
    }

    fn page_mask(&self) -> (u8, u8) {
        if self.model == CalcModel::Ti83Plus {
            (0x1F, 0x40)
        } else {
            (0x7F, 0x80)
        }
    }

    /// Recomputes bank slots 1-3 from the raw page-port values.
    fn update_mem_banks(&mut self) {
        let (page_mask, ram_flag) = self.page_mask();
        for slot in 0..2 {
            let value = self.mem_bank_ports[slot];
            let is_ram = value & ram_flag != 0;
            let page = (value & page_mask) as usize | ((self.mem_bank_high[slot] & 1) as usize) << 7;
            self.mem.change_page(slot + 1, page, is_ram);
        }
        let ram_page = (self.ram_bank_port & 0x07) as usize;
        self.mem.change_page(3, ram_page, true);
    }

    fn apply_mem_delays(&mut self) {
        let delays = self.seaux.delay.mem_delays(self.cpu_speed);
        self.mem.read_op_flash_tstates = delays.read_op_flash;
        self.mem.read_nop_flash_tstates = delays.read_nop_flash;
        self.mem.write_flash_tstates = delays.write_flash;
        self.mem.read_op_ram_tstates = delays.read_op_ram;
        self.mem.read_nop_ram_tstates = delays.read_nop_ram;
        self.mem.write_ram_tstates = delays.write_ram;
    }

    pub fn write(&mut self, port: u8, value: u8) {
        match self.bindings[port as usize] {
            PortKind::Unbound => {
                debug!("write to unbound port {port:#04x}: {value:#04x}");
            }
            PortKind::Link => self.link.write(value),
            PortKind::Keypad => self.keypad.write(value),
            PortKind::Status => {}
            PortKind::IntMask => self.stdint.write_mask(value),
            PortKind::IntStatus => {
                self.stdint.write_control(value, self.elapsed);
                if self.model.is_83p_family() {
                    self.mem.set_boot_mapped(self.stdint.bootmap_bit());
                }
            }
            PortKind::RamBank => {
                self.ram_bank_port = value;
                self.update_mem_banks();
            }
            PortKind::MemBankA => {
                self.mem_bank_ports[0] = value;
                self.update_mem_banks();
            }
            PortKind::MemBankB => {
                self.mem_bank_ports[1] = value;
                self.update_mem_banks();
            }
            PortKind::MemBankAHigh => {
                self.mem_bank_high[0] = value;
                self.update_mem_banks();
            }
            PortKind::MemBankBHigh => {
                self.mem_bank_high[1] = value;
                self.update_mem_banks();
            }
            PortKind::LcdCommand => self.display.controller().write_command(value),
            PortKind::LcdData => self.display.controller().write_data(value),
            PortKind::FlashLock => self.mem.set_flash_locked(value & 1 == 0),
            PortKind::ModelId => {}
            PortKind::BankControl83 => {
                self.bank_control = value;
                self.mem.compute_banks_83(value);
            }
            PortKind::LinkAssistEnable => self.assist.write_enable(value),
            PortKind::LinkAssistStatus => {}
            PortKind::LinkAssistBuffer => {}
            PortKind::LinkAssistSend => self.assist.write_buffer(value),
            PortKind::Md5Reg(i) => self.seaux.md5.write_reg(i as usize, value),
            PortKind::Md5Shift => self.seaux.md5.write_shift(value),
            PortKind::Md5Mode => self.seaux.md5.write_mode(value),
            PortKind::CpuSpeed => {
                self.cpu_speed = (value & 3) as usize;
                self.apply_mem_delays();
            }
            PortKind::Protected(i) => self.mem.write_protected(i as usize, value),
            PortKind::ChunkRemap(i) => self.mem.write_chunk_remap(i as usize, value),
            PortKind::Delay(i) => {
                self.seaux.delay.write(i as usize, value);
                self.apply_mem_delays();
            }
            PortKind::CrystalClock(i) => {
                self.seaux.crystal.timers[i as usize].write_clock(value);
                let skip = self.seaux.crystal.skip_factor();
                self.modify_interrupt(0x32, skip);
            }
            PortKind::CrystalLoop(i) => self.seaux.crystal.timers[i as usize].write_loop(value),
            PortKind::CrystalCount(i) => self.seaux.crystal.timers[i as usize].write_count(value),
            PortKind::Gpio => {
                self.seaux.write_gpio(value);
                if let Display::Color(lcd) = &mut self.display {
                    lcd.set_backlight(self.seaux.backlight_on());
                }
            }
            PortKind::ClockEnable => self.seaux.clock.write_enable(value, self.elapsed),
            PortKind::ClockSet(i) => self.seaux.clock.write_set(i as usize, value),
            PortKind::ClockRead(_) => {}
            PortKind::Usb(usb_port) => self.write_usb(usb_port, value),
        }
    }

    pub fn read(&mut self, port: u8) -> u8 {
        match self.bindings[port as usize] {
            PortKind::Unbound => 0xFF,
            PortKind::Link => self.link.read(),
            PortKind::Keypad => self.keypad.read(),
            PortKind::Status => self.status_byte(),
            PortKind::IntMask => self.stdint.read_mask(),
            PortKind::IntStatus => self.stdint.read_status(),
            PortKind::RamBank => self.ram_bank_port,
            PortKind::MemBankA => self.mem_bank_ports[0],
            PortKind::MemBankB => self.mem_bank_ports[1],
            PortKind::MemBankAHigh => self.mem_bank_high[0],
            PortKind::MemBankBHigh => self.mem_bank_high[1],
            PortKind::LcdCommand => self.display.controller().read_command(),
            PortKind::LcdData => self.display.controller().read_data(),
            PortKind::FlashLock => !self.mem.flash_locked() as u8,
            PortKind::ModelId => self.model.spec().model_id,
            PortKind::BankControl83 => self.bank_control,
            PortKind::LinkAssistEnable => self.assist.read_enable(),
            PortKind::LinkAssistStatus => self.assist.read_status(),
            PortKind::LinkAssistBuffer => self.assist.read_buffer(),
            PortKind::LinkAssistSend => self.assist.sent,
            PortKind::Md5Reg(i) => self.seaux.md5.read_byte(i as usize),
            PortKind::Md5Shift => self.seaux.md5.shift,
            PortKind::Md5Mode => self.seaux.md5.mode,
            PortKind::CpuSpeed => self.cpu_speed as u8,
            PortKind::Protected(i) => self.mem.read_protected(i as usize),
            PortKind::ChunkRemap(i) => self.mem.read_chunk_remap(i as usize),
            PortKind::Delay(i) => self.seaux.delay.read(i as usize),
            PortKind::CrystalClock(i) => self.seaux.crystal.timers[i as usize].clock,
            PortKind::CrystalLoop(i) => self.seaux.crystal.timers[i as usize].read_loop(),
            PortKind::CrystalCount(i) => self.seaux.crystal.timers[i as usize].read_count(),
            PortKind::Gpio => self.seaux.gpio,
            PortKind::ClockEnable => self.seaux.clock.read_enable(),
            PortKind::ClockSet(i) => self.seaux.clock.read_set(i as usize),
            PortKind::ClockRead(i) => self.seaux.clock.read_time(i as usize, self.elapsed),
            PortKind::Usb(usb_port) => self.read_usb(usb_port),
        }
    }

    fn write_usb(&mut self, usb_port: u8, value: u8) {
        let usb = &mut self.seaux.usb;
        match usb_port {
            0x4A => usb.write_event_mask(value),
            0x4C => usb.dev_control = value,
            0x54 => usb.write_events(value),
            0x57 | 0x5B => usb.protocol = value,
            _ => debug!("write to USB port {usb_port:#04x}: {value:#04x}"),
        }
    }

    fn read_usb(&mut self, usb_port: u8) -> u8 {
        let usb = &self.seaux.usb;
        match usb_port {
            0x4A => usb.event_mask,
            // Controller revision constant
            0x4C => 0x22,
            0x4D => usb.read_line_state() | VBUS_HIGH_MASK,
            0x54 => usb.read_events(),
            0x55 => usb.read_interrupt_status(),
            0x57 | 0x5B => usb.protocol,
            _ => 0,
        }
    }

    /// Simulated hard reset: peripherals to power-on defaults, bank map
    /// rebuilt. Port bindings and interrupt declarations are untouched.
    pub fn reset(&mut self) {
        let spec = self.model.spec();
        self.display.controller().reset();
        self.keypad.reset();
        self.link.reset();
        self.assist.reset();
        if self.model.has_se_aux() || self.model == CalcModel::Ti84Plus {
            self.assist.write_enable(0x80);
        }
        self.stdint.reset();
        self.seaux = SeAux::new();
        self.mem = MemoryMap::new(spec.flash_pages, spec.ram_pages, spec.flash_version);
        self.cpu_speed = 0;
        self.ram_bank_port = 0;
        self.mem_bank_ports = [0; 2];
        self.mem_bank_high = [0; 2];
        self.bank_control = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::MemSource;

    fn se() -> PortRegistry {
        match PortRegistry::bring_up(CalcModel::Ti83PlusSe, None) {
            Ok(registry) => registry,
            Err(e) => panic!("bring-up failed: {e}"),
        }
    }

    #[test]
    fn test_unsupported_model_fails() {
        assert!(PortRegistry::bring_up(CalcModel::Ti85, None).is_err());
        assert!(PortRegistry::bring_up(CalcModel::Ti73, None).is_err());
        assert!(PortRegistry::bring_up(CalcModel::Ti83, None).is_ok());
    }

    #[test]
    fn test_unbound_port_floats() {
        let mut registry = se();
        assert_eq!(registry.read(0xC0), 0xFF);
        // Dropped without effect
        registry.write(0xC0, 0x55);
        assert_eq!(registry.read(0xC0), 0xFF);
    }

    #[test]
    fn test_interrupt_declarations() {
        let registry = se();
        let ports: Vec<(u8, u32)> = registry
            .interrupts()
            .iter()
            .map(|b| (b.port, b.skip_factor))
            .collect();
        assert_eq!(ports, vec![(0x00, 1), (0x03, 8), (0x11, 128), (0x09, 3), (0x32, 8)]);

        let plain = PortRegistry::bring_up(CalcModel::Ti83Plus, None).unwrap();
        assert_eq!(plain.interrupts().len(), 3);
    }

    #[test]
    fn test_crystal_clock_write_modifies_skip_factor() {
        let mut registry = se();
        registry.write(0x30, 0x44);
        let binding = registry
            .interrupts()
            .iter()
            .find(|b| b.port == 0x32)
            .copied()
            .unwrap();
        assert_eq!(binding.skip_factor, 1);
        registry.write(0x30, 0x00);
        let binding = registry
            .interrupts()
            .iter()
            .find(|b| b.port == 0x32)
            .copied()
            .unwrap();
        assert_eq!(binding.skip_factor, 0);
    }

    #[test]
    fn test_mem_bank_ports_drive_slots() {
        let mut registry = se();
        registry.write(0x06, 0x45);
        let bank = registry.mem.banks()[1];
        assert_eq!(bank.source, MemSource::Flash);
        assert_eq!(bank.page, 0x45);

        registry.write(0x07, 0x80 | 0x03);
        let bank = registry.mem.banks()[2];
        assert_eq!(bank.source, MemSource::Ram);
        assert_eq!(bank.page, 3);

        registry.write(0x05, 0x05);
        assert_eq!(registry.mem.banks()[3].page, 5);
        assert_eq!(registry.read(0x06), 0x45);
    }

    #[test]
    fn test_plain_83p_page_mask() {
        let mut registry = PortRegistry::bring_up(CalcModel::Ti83Plus, None).unwrap();
        registry.write(0x06, 0x40 | 0x01);
        let bank = registry.mem.banks()[1];
        assert_eq!(bank.source, MemSource::Ram);
        assert_eq!(bank.page, 1);
        registry.write(0x06, 0x3F);
        // Page bits above the 32-page mask are ignored
        assert_eq!(registry.mem.banks()[1].page, 0x1F);
    }

    #[test]
    fn test_bootmap_follows_control_port()  {
        let mut registry = se();
        assert!(!registry.mem.boot_mapped());
        registry.write(0x04, 0x01);
        assert!(registry.mem.boot_mapped());
        registry.write(0x04, 0x06);
        assert!(!registry.mem.boot_mapped());
    }

    #[test]
    fn test_shadow_ports_on_plain_83p() {
        let mut plain = PortRegistry::bring_up(CalcModel::Ti83Plus, None).unwrap();
        assert_eq!(plain.binding(0x21), PortKind::Status);
        assert_eq!(plain.binding(0x26), PortKind::IntMask);
        assert_eq!(plain.binding(0x27), PortKind::MemBankB);
        assert_eq!(plain.read(0x21), plain.read(0x02));

        let registry = se();
        assert_eq!(registry.binding(0x21), PortKind::Protected(1));
        assert_eq!(registry.binding(0x27), PortKind::ChunkRemap(0));
    }

    #[test]
    fn test_status_and_model_id() {
        let mut registry = se();
        let status = registry.read(0x02);
        assert_eq!(status & 0x01, 0x01);
        assert_eq!(status & 0xE0, 0xE0);
        assert_eq!(registry.read(0x15), 0x33);

        let mut plain = PortRegistry::bring_up(CalcModel::Ti83Plus, None).unwrap();
        assert_eq!(plain.read(0x02) & 0xE0, 0x00);

        let mut cse = PortRegistry::bring_up(CalcModel::Ti84PlusCse, None).unwrap();
        assert_eq!(cse.read(0x15), 0x45);
    }

    #[test]
    fn test_flash_lock_gates_protected_ports() {
        let mut registry = se();
        registry.write(0x22, 0xAA);
        assert_eq!(registry.read(0x22), 0x00);
        registry.write(0x14, 0x01);
        registry.write(0x22, 0xAA);
        assert_eq!(registry.read(0x22), 0xAA);
        assert_eq!(registry.read(0x14), 1);
        registry.write(0x14, 0x00);
        assert!(registry.mem.flash_locked());
    }

    #[test]
    fn test_delay_ports_apply_tstates() {
        let mut registry = se();
        registry.write(0x29, 0x01);
        registry.write(0x2E, 0x07);
        assert_eq!(registry.mem.read_op_flash_tstates, 1);
        assert_eq!(registry.mem.write_flash_tstates, 1);
        assert_eq!(registry.mem.write_ram_tstates, 0);
        // Switching CPU speed re-derives from that speed's enable reg
        registry.write(0x20, 0x01);
        assert_eq!(registry.mem.read_op_flash_tstates, 0);
    }

    #[test]
    fn test_clock_ports_roundtrip() {
        let mut registry = se();
        registry.write(0x41, 0x20);
        registry.write(0x42, 0x01);
        registry.set_elapsed(4.0);
        registry.write(0x40, 0x03);
        registry.set_elapsed(6.0);
        assert_eq!(registry.read(0x45), 0x22);
        assert_eq!(registry.read(0x46), 0x01);
    }

    #[test]
    fn test_md5_ports() {
        let mut registry = se();
        for byte in [0x78, 0x56, 0x34, 0x12] {
            registry.write(0x18, byte);
        }
        registry.write(0x1F, 0x02);
        registry.write(0x1E, 0x00);
        assert_eq!(registry.read(0x18), 0x78);
        assert_eq!(registry.read(0x1B), 0x12);
    }

    #[test]
    fn test_gpio_drives_cse_backlight() {
        use crate::peripherals::seaux::GPIO_BACKLIGHT_BIT;
        let mut registry = PortRegistry::bring_up(CalcModel::Ti84PlusCse, None).unwrap();
        registry.write(0x3A, GPIO_BACKLIGHT_BIT);
        match &registry.display {
            Display::Color(lcd) => assert!(!lcd.backlight_active()),
            Display::Mono(_) => panic!("CSE must carry the color engine"),
        }
        registry.write(0x3A, 0);
        match &registry.display {
            Display::Color(lcd) => assert!(lcd.backlight_active()),
            Display::Mono(_) => unreachable!(),
        }
    }

    #[test]
    fn test_link_assist_ports() {
        let mut registry = se();
        // Bring-up seeds the assist enable register
        assert_eq!(registry.read(0x08), 0x80);
        registry.write(0x08, 0x02);
        registry.assist.byte_received(0x42);
        assert_ne!(registry.read(0x09) & 0x10, 0);
        assert_eq!(registry.read(0x0A), 0x42);
        assert_eq!(registry.read(0x09) & 0x10, 0);
        registry.write(0x0D, 0x99);
        assert_ne!(registry.read(0x09) & 0x80, 0);
    }

    #[test]
    fn test_ti83_bank_control_port() {
        let mut registry = PortRegistry::bring_up(CalcModel::Ti83, None).unwrap();
        registry.write(0x02, 0x02);
        assert_eq!(registry.read(0x02), 0x02);
        let bank = registry.mem.banks()[1];
        assert_eq!(bank.source, MemSource::Flash);
        assert_eq!(bank.page, 2);
    }

    #[test]
    fn test_reset_restores_power_on_map() {
        let mut registry = se();
        registry.write(0x06, 0x12);
        registry.write(0x04, 0x01);
        registry.reset();
        assert!(!registry.mem.boot_mapped());
        assert_eq!(registry.mem.banks()[1].page, 0);
        assert_eq!(registry.read(0x06), 0);
        assert_eq!(registry.read(0x08), 0x80);
    }
}
