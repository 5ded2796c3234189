//! Standard interrupt controller (ports 0x03/0x04).
//!
//! Two hardware timers and the ON key feed maskable interrupt latches.
//! Port 0x03 is the mask register; writing it also acknowledges: any latch
//! whose mask bit is written as zero is dropped. Port 0x04 reads back the
//! latch state and the live ON-key line; writing it selects the timer
//! frequency (and carries the memory-map mode bit on the 83+ line, which
//! the port registry routes to the bank logic).
//!
//! Interrupt scheduling itself is external: `advance` is fed elapsed
//! wall-clock seconds and trips the latches when a timer period lapses.

/// Timer base periods in seconds, chosen per model at bring-up
pub type FreqTable = [f64; 4];

/// SE-line crystal-derived periods
pub const TIMER_FREQ_SE: FreqTable = [1.0 / 512.0, 1.0 / 227.0, 1.0 / 158.0, 1.0 / 108.0];

/// Plain 83/83+ hardware periods
pub const TIMER_FREQ_83: FreqTable = [1.0 / 560.0, 1.0 / 248.0, 1.0 / 170.0, 1.0 / 118.0];

pub mod mask {
    pub const ON_KEY: u8 = 1;
    pub const TIMER1: u8 = 1 << 1;
    pub const TIMER2: u8 = 1 << 2;
    pub const LOW_POWER: u8 = 1 << 3;
}

#[derive(Debug, Clone)]
pub struct StdInt {
    freq: FreqTable,
    /// Interrupt mask register, last value written to port 0x03
    pub intactive: u8,
    /// Control register, last value written to port 0x04
    pub control: u8,
    timermax1: f64,
    timermax2: f64,
    lastchk1: f64,
    lastchk2: f64,
    on_latch: bool,
    timer1_latch: bool,
    timer2_latch: bool,
    on_pressed: bool,
}

impl StdInt {
    pub fn new(freq: FreqTable) -> Self {
        StdInt {
            freq,
            intactive: 0,
            control: 0,
            // Hardware powers up on the slowest timer setting
            timermax1: freq[3],
            timermax2: freq[3] / 2.0,
            lastchk1: 0.0,
            lastchk2: freq[3] / 4.0,
            on_latch: false,
            timer1_latch: false,
            timer2_latch: false,
            on_pressed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = StdInt::new(self.freq);
    }

    /// Mask write; a zero bit acknowledges the matching latch.
    pub fn write_mask(&mut self, value: u8) {
        if value & mask::ON_KEY == 0 {
            self.on_latch = false;
        }
        if value & mask::TIMER1 == 0 {
            self.timer1_latch = false;
        }
        if value & mask::TIMER2 == 0 {
            self.timer2_latch = false;
        }
        self.intactive = value;
    }

    pub fn read_mask(&self) -> u8 {
        self.intactive
    }

    /// Control write: bits 1-2 select the timer period. Timer phases
    /// restart from `elapsed`, timer 2 offset half a period behind.
    pub fn write_control(&mut self, value: u8, elapsed: f64) {
        self.control = value;
        let period = self.freq[((value >> 1) & 3) as usize];
        self.timermax1 = period;
        self.lastchk1 = elapsed;
        self.timermax2 = period / 2.0;
        self.lastchk2 = elapsed + period / 4.0;
    }

    /// Memory-map mode bit carried in the control register (83+ line)
    pub fn bootmap_bit(&self) -> bool {
        self.control & 1 != 0
    }

    /// Latch state plus the live (active-low) ON-key line.
    pub fn read_status(&self) -> u8 {
        let mut status = 0;
        if self.on_latch {
            status |= mask::ON_KEY;
        }
        if self.timer1_latch {
            status |= mask::TIMER1;
        }
        if self.timer2_latch {
            status |= mask::TIMER2;
        }
        if !self.on_pressed {
            status |= mask::LOW_POWER;
        }
        status
    }

    /// Trips timer latches for every period boundary crossed since the
    /// last call. `elapsed` is monotonic seconds.
    pub fn advance(&mut self, elapsed: f64) {
        while elapsed - self.lastchk1 >= self.timermax1 {
            self.timer1_latch = true;
            self.lastchk1 += self.timermax1;
        }
        while elapsed - self.lastchk2 >= self.timermax2 {
            self.timer2_latch = true;
            self.lastchk2 += self.timermax2;
        }
    }

    /// ON-key line from the keypad; the latch fires on the press edge.
    pub fn set_on_pressed(&mut self, pressed: bool) {
        if pressed && !self.on_pressed {
            self.on_latch = true;
        }
        self.on_pressed = pressed;
    }

    /// A masked-in latch is raised
    pub fn interrupt_pending(&self) -> bool {
        (self.intactive & mask::ON_KEY != 0 && self.on_latch)
            || (self.intactive & mask::TIMER1 != 0 && self.timer1_latch)
            || (self.intactive & mask::TIMER2 != 0 && self.timer2_latch)
    }

    pub fn timer_period(&self) -> f64 {
        self.timermax1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_latches_after_period() {
        let mut stdint = StdInt::new(TIMER_FREQ_SE);
        stdint.write_mask(mask::TIMER1);
        stdint.write_control(0, 0.0);
        assert!(!stdint.interrupt_pending());
        stdint.advance(1.0 / 512.0 + 1e-6);
        assert!(stdint.interrupt_pending());
        assert_ne!(stdint.read_status() & mask::TIMER1, 0);
    }

    #[test]
    fn test_mask_write_acks_latches() {
        let mut stdint = StdInt::new(TIMER_FREQ_SE);
        stdint.write_mask(mask::TIMER1 | mask::TIMER2);
        stdint.write_control(0, 0.0);
        stdint.advance(0.1);
        assert_ne!(stdint.read_status() & (mask::TIMER1 | mask::TIMER2), 0);
        stdint.write_mask(0);
        assert_eq!(stdint.read_status() & (mask::TIMER1 | mask::TIMER2), 0);
        assert!(!stdint.interrupt_pending());
    }

    #[test]
    fn test_frequency_select() {
        let mut stdint = StdInt::new(TIMER_FREQ_SE);
        stdint.write_control(3 << 1, 0.0);
        assert!((stdint.timer_period() - 1.0 / 108.0).abs() < 1e-12);
        stdint.write_control(1 << 1, 0.0);
        assert!((stdint.timer_period() - 1.0 / 227.0).abs() < 1e-12);
    }

    #[test]
    fn test_timer2_runs_at_double_rate() {
        let mut stdint = StdInt::new(TIMER_FREQ_SE);
        stdint.write_mask(mask::TIMER2);
        stdint.write_control(0, 0.0);
        // Half a period plus the quarter-period phase offset
        stdint.advance(1.0 / 512.0 * 0.80);
        assert!(stdint.interrupt_pending());
    }

    #[test]
    fn test_on_key_edge_latch() {
        let mut stdint = StdInt::new(TIMER_FREQ_SE);
        stdint.write_mask(mask::ON_KEY);
        stdint.set_on_pressed(true);
        assert!(stdint.interrupt_pending());
        assert_eq!(stdint.read_status() & mask::LOW_POWER, 0);
        // Holding does not re-latch after an ack
        stdint.write_mask(0);
        stdint.set_on_pressed(true);
        assert!(!stdint.interrupt_pending());
        stdint.set_on_pressed(false);
        assert_ne!(stdint.read_status() & mask::LOW_POWER, 0);
    }

    #[test]
    fn test_masked_out_latch_does_not_interrupt() {
        let mut stdint = StdInt::new(TIMER_FREQ_83);
        stdint.write_control(0, 0.0);
        stdint.advance(1.0);
        assert!(!stdint.interrupt_pending());
        assert_ne!(stdint.read_status() & mask::TIMER1, 0);
    }

    #[test]
    fn test_bootmap_bit() {
        let mut stdint = StdInt::new(TIMER_FREQ_SE);
        stdint.write_control(0x01, 0.0);
        assert!(stdint.bootmap_bit());
        stdint.write_control(0x06, 0.0);
        assert!(!stdint.bootmap_bit());
    }
}
