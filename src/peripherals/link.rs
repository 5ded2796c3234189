//! Link port and the SE-line hardware link assist.
//!
//! The bare link port (port 0x00) drives two open-collector lines. Each
//! side holds its pair of line bits; a read returns the wired-AND of both
//! sides, inverted into the active-low convention the ROM expects.
//!
//! The link assist (ports 0x08-0x0A/0x0D on the SE line) is a byte-level
//! shifter in front of the same lines. The transport itself is external;
//! this models the register file: an enable/interrupt mask, a composed
//! status byte, a receive buffer whose read clears the byte-available
//! flag, and a send buffer.

/// Bare link port lines. `host` is this calculator's driven pair,
/// `client` the remote side's.
#[derive(Debug, Clone, Default)]
pub struct LinkPort {
    pub host: u8,
    pub client: u8,
}

impl LinkPort {
    pub fn new() -> Self {
        LinkPort::default()
    }

    /// Drives the local line pair from the low two bits.
    pub fn write(&mut self, value: u8) {
        self.host = value & 3;
    }

    /// Wired-AND of both sides, active low.
    pub fn read(&self) -> u8 {
        ((self.host & 3) | (self.client & 3)) ^ 3
    }

    pub fn reset(&mut self) {
        self.host = 0;
        self.client = 0;
    }
}

/// Enable-register bits (port 0x08): each gates the matching condition
/// into the low interrupt-pending bits of the status byte.
pub mod enable {
    pub const INT_RECEIVING: u8 = 1;
    pub const INT_READ: u8 = 1 << 1;
    pub const INT_ERROR: u8 = 1 << 2;
}

#[derive(Debug, Clone, Default)]
pub struct LinkAssist {
    /// Enable / interrupt-mask register
    pub enabled: u8,
    /// Receive buffer
    pub received: u8,
    /// Send buffer
    pub sent: u8,
    /// Mid-byte on the receive side
    pub receiving: bool,
    /// A received byte is waiting in the buffer
    pub read: bool,
    /// Shifter idle, ready to accept a byte to send
    pub ready: bool,
    /// Framing error latch
    pub error: bool,
    /// Mid-byte on the send side
    pub sending: bool,
}

impl LinkAssist {
    pub fn new() -> Self {
        LinkAssist {
            ready: true,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = LinkAssist::new();
    }

    pub fn write_enable(&mut self, value: u8) {
        self.enabled = value;
    }

    pub fn read_enable(&self) -> u8 {
        self.enabled
    }

    /// Status byte: gated interrupt-pending conditions in the low bits,
    /// raw shifter state in the high bits.
    pub fn read_status(&self) -> u8 {
        let mut status = 0;
        if self.enabled & enable::INT_RECEIVING != 0 && self.receiving {
            status |= 1;
        }
        if self.enabled & enable::INT_READ != 0 && self.read {
            status |= 1 << 1;
        }
        if self.enabled & enable::INT_ERROR != 0 && self.error {
            status |= 1 << 2;
        }
        status |= (self.receiving as u8) << 3;
        status |= (self.read as u8) << 4;
        status |= (self.ready as u8) << 5;
        status |= (self.error as u8) << 6;
        status |= (self.sending as u8) << 7;
        status
    }

    /// Reading the buffer consumes the byte and clears the error latch.
    pub fn read_buffer(&mut self) -> u8 {
        self.read = false;
        self.error = false;
        self.received
    }

    /// Queues a byte for the external transport to shift out.
    pub fn write_buffer(&mut self, value: u8) {
        self.sent = value;
        self.sending = true;
        self.ready = false;
    }

    /// Called by the external transport when a full byte has arrived.
    /// An unconsumed previous byte raises the error latch.
    pub fn byte_received(&mut self, value: u8) {
        if self.read {
            self.error = true;
        }
        self.received = value;
        self.read = true;
        self.receiving = false;
    }

    /// Called by the external transport when the send shifter drains.
    pub fn byte_sent(&mut self) {
        self.sending = false;
        self.ready = true;
    }

    /// Any gated condition is pending
    pub fn interrupt_pending(&self) -> bool {
        self.read_status() & 0x07 != 0
    }
}
