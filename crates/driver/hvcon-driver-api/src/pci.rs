//! PCI configuration-space access.

use core::fmt;

/// PCI bus/device/function address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PciAddress {
    /// Bus number (0-255).
    pub bus: u8,
    /// Device number (0-31).
    pub device: u8,
    /// Function number (0-7).
    pub function: u8,
}

impl PciAddress {
    /// Creates an address, rejecting out-of-range device or function numbers.
    #[must_use]
    pub const fn new(bus: u8, device: u8, function: u8) -> Option<Self> {
        if device > 0x1F || function > 0x07 {
            return None;
        }
        Some(Self {
            bus,
            device,
            function,
        })
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// Configuration-space accessor for segment 0.
///
/// Offsets are byte offsets into the 256-byte type 0/1 header. Functions
/// that are not populated read as all-ones.
pub trait PciConfigAccess: Send + Sync {
    /// Reads an 8-bit register.
    fn read_u8(&self, addr: PciAddress, offset: u8) -> u8;

    /// Reads a 16-bit register. `offset` must be 2-byte aligned.
    fn read_u16(&self, addr: PciAddress, offset: u8) -> u16;

    /// Reads a 32-bit register. `offset` must be 4-byte aligned.
    fn read_u32(&self, addr: PciAddress, offset: u8) -> u32;

    /// Writes a 16-bit register. `offset` must be 2-byte aligned.
    fn write_u16(&self, addr: PciAddress, offset: u8, value: u16);

    /// Writes a 32-bit register. `offset` must be 4-byte aligned.
    fn write_u32(&self, addr: PciAddress, offset: u8, value: u32);
}

/// Standard configuration-space register offsets and bits.
pub mod regs {
    /// Vendor ID (16-bit).
    pub const VENDOR_ID: u8 = 0x00;
    /// Command register (16-bit).
    pub const COMMAND: u8 = 0x04;
    /// Class code word: `(class << 8) | subclass` (16-bit at 0x0A).
    pub const CLASS_DEVICE: u8 = 0x0A;
    /// Header type (8-bit). Bit 7 = multi-function.
    pub const HEADER_TYPE: u8 = 0x0E;
    /// Base Address Register 0 (32-bit). BAR1-5 follow at 4-byte intervals.
    pub const BAR0: u8 = 0x10;
    /// Bridge I/O base/limit pair (16-bit) -- type 1 headers only.
    pub const IO_BASE: u8 = 0x1C;
    /// Interrupt line (8-bit).
    pub const INTERRUPT_LINE: u8 = 0x3C;
    /// Interrupt pin (8-bit). 0 = none.
    pub const INTERRUPT_PIN: u8 = 0x3D;

    /// Command register: I/O space decode enable.
    pub const COMMAND_IO: u16 = 1 << 0;
    /// BAR bit 0: the BAR describes an I/O window.
    pub const BAR_SPACE_IO: u32 = 1 << 0;
    /// Header type bit 7: the device implements functions 1-7.
    pub const HEADER_MULTI_FUNCTION: u8 = 0x80;

    /// Returns the offset of BAR `index`.
    #[must_use]
    pub const fn bar(index: u8) -> u8 {
        BAR0 + index * 4
    }
}
