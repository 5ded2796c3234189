//! Bank switching: four 16 KB address-space slots mapped onto flash or
//! RAM pages.
//!
//! The TI-83 switches all four slots at once through a single control
//! port whose bits index the constant `BANKS_83` table of symbolic
//! sources. The 83+ family instead exposes per-slot page ports plus a
//! boot-map mode that remaps the low slots for the boot code.
//!
//! Storage arrays live outside this crate; only descriptors (source,
//! page, offset, flags) are computed here.

use log::warn;

/// Slot granularity
pub const PAGE_SIZE: usize = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSource {
    Flash,
    Ram,
    None,
}

/// One active 16 KB window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankDescriptor {
    pub source: MemSource,
    pub page: usize,
    pub byte_offset: usize,
    pub read_only: bool,
    pub is_ram: bool,
    pub no_exec: bool,
}

impl BankDescriptor {
    pub fn unmapped() -> Self {
        BankDescriptor {
            source: MemSource::None,
            page: 0,
            byte_offset: 0,
            read_only: true,
            is_ram: false,
            no_exec: false,
        }
    }

    fn flash(page: usize, flash_pages: usize) -> Self {
        BankDescriptor {
            source: MemSource::Flash,
            page,
            byte_offset: page * PAGE_SIZE,
            // The last flash page holds the boot code
            read_only: page == flash_pages - 1,
            is_ram: false,
            no_exec: false,
        }
    }

    fn ram(page: usize) -> Self {
        BankDescriptor {
            source: MemSource::Ram,
            page,
            byte_offset: page * PAGE_SIZE,
            read_only: false,
            is_ram: true,
            no_exec: false,
        }
    }
}

/// Symbolic cell of the TI-83 bank table. `Swap` defers to the live
/// page-select register and ram bit at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankEntry {
    Rom0,
    Rom0_8,
    Rom1_8,
    Rom1_9,
    Ram0,
    Ram1,
    Swap,
}

/// TI-83 bank rows indexed by `(map << 2) | (xy << 1) | ram` from the
/// control byte. The two reserved selectors are unmapped.
pub const BANKS_83: [Option<[BankEntry; 4]>; 16] = {
    use BankEntry::*;
    const MAP0: [BankEntry; 4] = [Rom0, Swap, Ram1, Ram0];
    const MAP1: [BankEntry; 4] = [Rom0, Swap, Swap, Ram0];
    const MAP2_X: [BankEntry; 4] = [Rom0, Rom0_8, Ram1, Ram0];
    const MAP2_Y: [BankEntry; 4] = [Rom0, Rom1_8, Ram1, Ram0];
    const MAP3: [BankEntry; 4] = [Rom0, Rom1_8, Rom1_9, Ram0];
    [
        Some(MAP0),
        Some(MAP0),
        Some(MAP0),
        Some(MAP0),
        Some(MAP1),
        Some(MAP1),
        Some(MAP1),
        Some(MAP1),
        Some(MAP2_X),
        Some(MAP2_X),
        Some(MAP2_Y),
        Some(MAP2_Y),
        Some(MAP3),
        Some(MAP3),
        None,
        None,
    ]
};

/// TI-83 control-byte fields (port 0x02)
pub mod sel {
    pub const SWAP_PAGE: u8 = 0x07;
    pub const XY: u8 = 0x08;
    pub const RAM: u8 = 0x10;
    pub const MAP: u8 = 0x60;
}

/// The four live descriptors plus the page-port state behind them.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    pub flash_pages: usize,
    pub ram_pages: usize,
    pub flash_version: u8,
    banks: [BankDescriptor; 4],
    bootmap_banks: [BankDescriptor; 4],
    boot_mapped: bool,
    flash_locked: bool,
    /// Flash-unlock-gated protection registers, ports 0x20-0x26
    protected: [u8; 7],
    /// Chunk-remap counters, ports 0x27/0x28
    chunk_remap: [u8; 2],
    /// Extra t-states per access class, fed from the delay ports
    pub read_op_flash_tstates: u32,
    pub read_nop_flash_tstates: u32,
    pub write_flash_tstates: u32,
    pub read_op_ram_tstates: u32,
    pub read_nop_ram_tstates: u32,
    pub write_ram_tstates: u32,
}

impl MemoryMap {
    pub fn new(flash_pages: usize, ram_pages: usize, flash_version: u8) -> Self {
        let mut map = MemoryMap {
            flash_pages,
            ram_pages,
            flash_version,
            banks: [BankDescriptor::unmapped(); 4],
            bootmap_banks: [BankDescriptor::unmapped(); 4],
            boot_mapped: false,
            flash_locked: true,
            protected: [0; 7],
            chunk_remap: [0; 2],
            read_op_flash_tstates: 0,
            read_nop_flash_tstates: 0,
            write_flash_tstates: 0,
            read_op_ram_tstates: 0,
            read_nop_ram_tstates: 0,
            write_ram_tstates: 0,
        };
        // Power-on map: boot page, flash 0 twice, RAM 0
        map.change_page(0, flash_pages - 1, false);
        map.change_page(1, 0, false);
        map.change_page(2, 0, false);
        map.change_page(3, 0, true);
        map
    }

    /// Active descriptors, honoring boot-map mode.
    pub fn banks(&self) -> &[BankDescriptor; 4] {
        if self.boot_mapped {
            &self.bootmap_banks
        } else {
            &self.banks
        }
    }

    pub fn normal_banks(&self) -> &[BankDescriptor; 4] {
        &self.banks
    }

    pub fn boot_mapped(&self) -> bool {
        self.boot_mapped
    }

    pub fn set_boot_mapped(&mut self, mapped: bool) {
        self.boot_mapped = mapped;
    }

    pub fn flash_locked(&self) -> bool {
        self.flash_locked
    }

    pub fn set_flash_locked(&mut self, locked: bool) {
        self.flash_locked = locked;
    }

    /// Repoints one slot and refreshes the boot-map shadow.
    pub fn change_page(&mut self, bank: usize, page: usize, is_ram: bool) {
        let page = page & 0xFF;
        self.banks[bank] = if is_ram {
            BankDescriptor::ram(page % self.ram_pages)
        } else {
            BankDescriptor::flash(page % self.flash_pages, self.flash_pages)
        };
        self.update_bootmap_pages();
    }

    /// Boot-map remap: slot 0 unchanged, slot 1 drops its low page bit,
    /// slot 2 mirrors the normal slot 1 with the low bit forced (except
    /// on version-1 flash), slot 3 mirrors the normal slot 2. Slots 1-3
    /// shed their write and execute restrictions.
    fn update_bootmap_pages(&mut self) {
        self.bootmap_banks[0] = self.banks[0];

        let mut bank1 = self.banks[1];
        bank1.page &= 0xFE;
        bank1.byte_offset = bank1.page * PAGE_SIZE;
        bank1.read_only = false;
        bank1.no_exec = false;
        self.bootmap_banks[1] = bank1;

        let mut bank2 = self.banks[1];
        bank2.page |= if self.flash_version == 1 { 0 } else { 1 };
        bank2.byte_offset = bank2.page * PAGE_SIZE;
        bank2.read_only = false;
        bank2.no_exec = false;
        self.bootmap_banks[2] = bank2;

        let mut bank3 = self.banks[2];
        bank3.read_only = false;
        bank3.no_exec = false;
        self.bootmap_banks[3] = bank3;
    }

    /// Protection-register write, ports 0x20-0x26; silently dropped
    /// while flash is locked.
    pub fn write_protected(&mut self, index: usize, value: u8) {
        if !self.flash_locked {
            if let Some(reg) = self.protected.get_mut(index) {
                *reg = value;
            }
        }
    }

    pub fn read_protected(&self, index: usize) -> u8 {
        self.protected.get(index).copied().unwrap_or(0)
    }

    pub fn write_chunk_remap(&mut self, index: usize, value: u8) {
        if let Some(reg) = self.chunk_remap.get_mut(index & 1) {
            *reg = value;
        }
    }

    pub fn read_chunk_remap(&self, index: usize) -> u8 {
        self.chunk_remap[index & 1]
    }

    /// TI-83 whole-map recompute from the control byte. An unmapped
    /// selector leaves the current descriptors in place.
    pub fn compute_banks_83(&mut self, control: u8) {
        let swap_page = (control & sel::SWAP_PAGE) as usize;
        let xy = control & sel::XY != 0;
        let ram = control & sel::RAM != 0;
        let map = ((control & sel::MAP) >> 5) as usize;

        let selector = (map << 2) | ((xy as usize) << 1) | ram as usize;
        let row = match BANKS_83[selector] {
            Some(row) => row,
            None => {
                warn!("unmapped bank selector {selector:#04x}, keeping current map");
                return;
            }
        };

        for (slot, entry) in row.iter().enumerate() {
            self.banks[slot] = self.resolve_83(*entry, swap_page, xy, ram);
        }
        self.update_bootmap_pages();
    }

    /// Swap cells resolve against the live page register on every call.
    fn resolve_83(&self, entry: BankEntry, swap_page: usize, xy: bool, ram: bool) -> BankDescriptor {
        match entry {
            BankEntry::Rom0 => BankDescriptor::flash(0, self.flash_pages),
            BankEntry::Rom0_8 => {
                BankDescriptor::flash(if xy { 8 } else { 0 }, self.flash_pages)
            }
            BankEntry::Rom1_8 => {
                BankDescriptor::flash(if xy { 8 } else { 1 }, self.flash_pages)
            }
            BankEntry::Rom1_9 => {
                BankDescriptor::flash(if xy { 9 } else { 1 }, self.flash_pages)
            }
            BankEntry::Ram0 => BankDescriptor::ram(0),
            BankEntry::Ram1 => BankDescriptor::ram(1 % self.ram_pages),
            BankEntry::Swap => {
                if ram {
                    BankDescriptor::ram(swap_page % self.ram_pages)
                } else {
                    let page = (swap_page | ((xy as usize) << 3)) % self.flash_pages;
                    BankDescriptor::flash(page, self.flash_pages)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn se_map() -> MemoryMap {
        MemoryMap::new(128, 8, 2)
    }

    #[test]
    fn test_power_on_map() {
        let map = se_map();
        let banks = map.normal_banks();
        assert_eq!(banks[0].source, MemSource::Flash);
        assert_eq!(banks[0].page, 127);
        assert!(banks[0].read_only);
        assert_eq!(banks[1].page, 0);
        assert_eq!(banks[2].page, 0);
        assert_eq!(banks[3].source, MemSource::Ram);
        assert!(banks[3].is_ram);
    }

    #[test]
    fn test_change_page_offset_invariant() {
        let mut map = se_map();
        map.change_page(1, 0x45, false);
        let bank = map.normal_banks()[1];
        assert_eq!(bank.page, 0x45);
        assert_eq!(bank.byte_offset, 0x45 * PAGE_SIZE);
        assert!(!bank.read_only);
    }

    #[test]
    fn test_last_flash_page_is_read_only() {
        let mut map = se_map();
        map.change_page(2, 127, false);
        assert!(map.normal_banks()[2].read_only);
        map.change_page(2, 126, false);
        assert!(!map.normal_banks()[2].read_only);
    }

    #[test]
    fn test_ram_page_wraps_modulo_count() {
        let mut map = se_map();
        map.change_page(3, 9, true);
        let bank = map.normal_banks()[3];
        assert_eq!(bank.page, 1);
        assert!(bank.is_ram);
        assert!(!bank.read_only);
    }

    #[test]
    fn test_bootmap_remap_arithmetic() {
        let mut map = se_map();
        map.change_page(1, 0x45, false);
        map.change_page(2, 0x12, false);
        map.set_boot_mapped(true);
        let banks = *map.banks();
        // Slot 1 drops the low bit, slot 2 forces it
        assert_eq!(banks[1].page, 0x44);
        assert_eq!(banks[2].page, 0x45);
        assert_eq!(banks[2].byte_offset, 0x45 * PAGE_SIZE);
        // Slot 3 mirrors the normal slot 2
        assert_eq!(banks[3].page, 0x12);
        assert_eq!(banks[0].page, 127);
    }

    #[test]
    fn test_bootmap_version1_skips_odd_force() {
        let mut map = MemoryMap::new(32, 2, 1);
        map.change_page(1, 0x0B, false);
        map.set_boot_mapped(true);
        // Slot 1 still drops the low bit; slot 2 keeps the normal page
        // untouched on version-1 flash.
        assert_eq!(map.banks()[1].page, 0x0A);
        assert_eq!(map.banks()[2].page, 0x0B);
    }

    #[test]
    fn test_bootmap_shadows_are_writable() {
        let mut map = MemoryMap::new(32, 2, 1);
        map.change_page(1, 0x1F, false);
        map.change_page(2, 0x1F, false);
        assert!(map.normal_banks()[1].read_only);
        assert!(map.normal_banks()[2].read_only);
        map.set_boot_mapped(true);
        for bank in &map.banks()[1..] {
            assert!(!bank.read_only);
            assert!(!bank.no_exec);
        }
    }

    #[test]
    fn test_protected_ports_gated_by_flash_lock() {
        let mut map = se_map();
        map.write_protected(2, 0xAA);
        assert_eq!(map.read_protected(2), 0);
        map.set_flash_locked(false);
        map.write_protected(2, 0xAA);
        assert_eq!(map.read_protected(2), 0xAA);
    }

    #[test]
    fn test_banks_83_map0_slots() {
        let mut map = MemoryMap::new(4, 2, 1);
        map.compute_banks_83(0);
        let banks = *map.normal_banks();
        assert_eq!(banks[0].source, MemSource::Flash);
        assert_eq!(banks[0].page, 0);
        // Swap with ram=0 resolves to a flash page
        assert_eq!(banks[1].source, MemSource::Flash);
        assert_eq!(banks[2], BankDescriptor::ram(1));
        assert_eq!(banks[3], BankDescriptor::ram(0));
    }

    #[test]
    fn test_banks_83_swap_tracks_ram_bit() {
        let mut map = MemoryMap::new(4, 2, 1);
        map.compute_banks_83(sel::RAM | 0x01);
        assert_eq!(map.normal_banks()[1].source, MemSource::Ram);
        assert_eq!(map.normal_banks()[1].page, 1 % 2);

        map.compute_banks_83(0x02);
        let bank = map.normal_banks()[1];
        assert_eq!(bank.source, MemSource::Flash);
        assert_eq!(bank.page, 2);
    }

    #[test]
    fn test_banks_83_swap_page_modulo() {
        let mut map = MemoryMap::new(4, 2, 1);
        // xy folds bit 3 into the flash swap page: (7 | 8) % 4 == 3
        map.compute_banks_83(sel::XY | 0x07);
        assert_eq!(map.normal_banks()[1].page, 3);
        // ram swap: page 7 % 2 == 1
        map.compute_banks_83(sel::RAM | 0x07);
        assert_eq!(map.normal_banks()[1].page, 1);
    }

    #[test]
    fn test_banks_83_map3_rom_pair() {
        let mut map = MemoryMap::new(16, 2, 1);
        map.compute_banks_83(0x60);
        let banks = *map.normal_banks();
        assert_eq!(banks[1].page, 1);
        assert_eq!(banks[2].page, 1);
        map.compute_banks_83(0x60 | sel::XY);
        // Reserved selector: descriptors unchanged
        assert_eq!(*map.normal_banks(), banks);
    }

    #[test]
    fn test_banks_83_reserved_selector_keeps_map() {
        let mut map = MemoryMap::new(16, 2, 1);
        map.compute_banks_83(0);
        let before = *map.normal_banks();
        map.compute_banks_83(0x60 | sel::XY | sel::RAM);
        assert_eq!(*map.normal_banks(), before);
    }
}
