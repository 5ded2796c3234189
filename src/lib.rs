//! Z80 graphing-calculator display and I/O-port hardware core.
//!
//! This crate emulates the hardware layer of the TI-83/83+/84+ calculator
//! family that guest software touches through I/O ports: the two display
//! controllers (monochrome multi-shade and color driver chip), the 4-slot
//! 16 KB bank-switching logic, and the per-model port wiring with its
//! interrupt declarations.
//!
//! The CPU loop, link transport, storage arrays, and presentation layer
//! live outside; they drive this core through [`ports::PortRegistry`]:
//!
//! ```
//! use calc_hw::model::CalcModel;
//! use calc_hw::ports::PortRegistry;
//!
//! let mut calc = PortRegistry::bring_up(CalcModel::Ti84PlusSe, None).unwrap();
//! calc.write(0x10, 0x03); // mono LCD: display on
//! assert_ne!(calc.read(0x10) & 0x20, 0);
//! ```
//!
//! Composed frames are delivered as owned snapshots over an mpsc channel
//! passed at bring-up, so a presentation thread never aliases live
//! engine state.

pub mod banks;
pub mod model;
pub mod peripherals;
pub mod ports;


pub use banks::{BankDescriptor, MemSource, MemoryMap, PAGE_SIZE};
pub use model::CalcModel;
pub use peripherals::display::{FrameSender, FrameUpdate};
pub use ports::{Display, InterruptBinding, PortKind, PortRegistry};
