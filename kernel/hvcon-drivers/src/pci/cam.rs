//! PCI Configuration Access Mechanism (CAM) via legacy I/O ports.
//!
//! Uses ports `0xCF8` (CONFIG_ADDRESS) and `0xCFC` (CONFIG_DATA) to reach
//! the 256-byte configuration space of each function on segment 0.

use hvcon_core::arch::x86_64::Port;
use hvcon_driver_api::{PciAddress, PciConfigAccess};

const CONFIG_ADDRESS: u16 = 0x0CF8;
const CONFIG_DATA: u16 = 0x0CFC;

/// Configuration access through ports 0xCF8/0xCFC.
pub struct PciCam {
    _private: (),
}

impl PciCam {
    /// Creates the accessor.
    ///
    /// # Safety
    ///
    /// The caller must own the CONFIG_ADDRESS/CONFIG_DATA pair: no other
    /// code may use it while this value exists, and accesses through it
    /// must not run concurrently.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Builds the CONFIG_ADDRESS value for a function and register offset.
    #[inline]
    fn make_address(addr: PciAddress, offset: u8) -> u32 {
        (1u32 << 31) // enable bit
            | (u32::from(addr.bus) << 16)
            | (u32::from(addr.device & 0x1F) << 11)
            | (u32::from(addr.function & 0x07) << 8)
            | (u32::from(offset) & 0xFC)
    }

    fn select(addr: PciAddress, offset: u8) {
        // SAFETY: `new` gave us exclusive use of the CAM port pair.
        unsafe { Port::<u32>::new(CONFIG_ADDRESS).write(Self::make_address(addr, offset)) }
    }
}

impl PciConfigAccess for PciCam {
    fn read_u8(&self, addr: PciAddress, offset: u8) -> u8 {
        let shift = u32::from(offset & 3) * 8;
        #[allow(clippy::cast_possible_truncation)]
        let byte = (self.read_u32(addr, offset) >> shift) as u8;
        byte
    }

    fn read_u16(&self, addr: PciAddress, offset: u8) -> u16 {
        let shift = u32::from(offset & 2) * 8;
        #[allow(clippy::cast_possible_truncation)]
        let word = (self.read_u32(addr, offset) >> shift) as u16;
        word
    }

    fn read_u32(&self, addr: PciAddress, offset: u8) -> u32 {
        Self::select(addr, offset);
        // SAFETY: CONFIG_ADDRESS was just programmed; see `new`.
        unsafe { Port::<u32>::new(CONFIG_DATA).read() }
    }

    fn write_u16(&self, addr: PciAddress, offset: u8, value: u16) {
        let shift = u32::from(offset & 2) * 8;
        let merged = (self.read_u32(addr, offset) & !(0xFFFF << shift)) | (u32::from(value) << shift);
        self.write_u32(addr, offset, merged);
    }

    fn write_u32(&self, addr: PciAddress, offset: u8, value: u32) {
        Self::select(addr, offset);
        // SAFETY: CONFIG_ADDRESS was just programmed; see `new`.
        unsafe { Port::<u32>::new(CONFIG_DATA).write(value) }
    }
}
