//! Register access layer.
//!
//! Translates a register index into a port or memory access. The addressing
//! mode is fixed the first time the binding is attached or mapped and never
//! changes afterwards; remapping an already-mapped port is a no-op.

use alloc::boxed::Box;
use core::fmt;

use hvcon_driver_api::{DriverError, MmioWindow, PlatformServices, PortIo};

use super::config::ConfigError;
use super::regs::{EXISTENCE_SENTINEL, reg};

/// Addresses below this are legacy I/O ports; anything else is physical memory.
pub const IO_SPACE_LIMIT: u64 = 0x1_0000;

/// Canonical size of a 16550 register block.
pub const DEFAULT_IO_SIZE: u32 = 8;

/// Width of each register access. Registers are bytes either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    /// 8-bit loads and stores.
    Byte,
    /// 32-bit loads and stores, low byte significant.
    Dword,
}

impl RegWidth {
    /// Access size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Dword => 4,
        }
    }
}

impl TryFrom<u32> for RegWidth {
    type Error = ConfigError;

    fn try_from(bytes: u32) -> Result<Self, Self::Error> {
        match bytes {
            1 => Ok(Self::Byte),
            4 => Ok(Self::Dword),
            other => Err(ConfigError::UnsupportedRegWidth(other)),
        }
    }
}

/// Where a port's registers live and how they are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressBinding {
    /// I/O port number or physical address of register 0.
    pub io_base: u64,
    /// Size of the register window in bytes.
    pub io_size: u32,
    /// Register index is shifted left by this many bits (memory-mapped only).
    pub reg_shift: u32,
    /// Access width.
    pub reg_width: RegWidth,
}

impl AddressBinding {
    /// A classic byte-wide, unshifted 8-register block.
    #[must_use]
    pub const fn legacy(io_base: u64) -> Self {
        Self {
            io_base,
            io_size: DEFAULT_IO_SIZE,
            reg_shift: 0,
            reg_width: RegWidth::Byte,
        }
    }

    /// Whether the base is small enough to be a legacy I/O port.
    #[must_use]
    pub const fn is_io_port(&self) -> bool {
        self.io_base < IO_SPACE_LIMIT
    }
}

/// Addressing mode currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Not yet attached; reads return the existence sentinel.
    Unmapped,
    /// Legacy I/O space: `base + reg`.
    PortMapped,
    /// Memory window: `base + (reg << shift)`.
    MemoryMapped,
}

enum Handle {
    Unmapped,
    Port { io: &'static dyn PortIo, base: u16 },
    Mmio(Box<dyn MmioWindow>),
}

/// A port's register accessor. Owns the mapping once one exists.
pub struct RegisterAccess {
    binding: AddressBinding,
    handle: Handle,
}

impl fmt::Debug for RegisterAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterAccess")
            .field("binding", &self.binding)
            .field("mode", &self.mode())
            .finish()
    }
}

impl RegisterAccess {
    /// Creates an unattached accessor for `binding`.
    #[must_use]
    pub const fn new(binding: AddressBinding) -> Self {
        Self {
            binding,
            handle: Handle::Unmapped,
        }
    }

    /// The binding this accessor was created with.
    #[must_use]
    pub const fn binding(&self) -> &AddressBinding {
        &self.binding
    }

    /// Addressing mode in effect.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        match self.handle {
            Handle::Unmapped => AccessMode::Unmapped,
            Handle::Port { .. } => AccessMode::PortMapped,
            Handle::Mmio(_) => AccessMode::MemoryMapped,
        }
    }

    /// Attaches legacy port I/O if the binding is an I/O port and the
    /// platform has an I/O space. Does nothing once a mode is fixed.
    ///
    /// Port I/O needs no mapping, so this can run before the existence probe.
    pub fn attach_port_io(&mut self, platform: &'static dyn PlatformServices) -> bool {
        if !matches!(self.handle, Handle::Unmapped) {
            return matches!(self.handle, Handle::Port { .. });
        }
        let Ok(base) = u16::try_from(self.binding.io_base) else {
            return false;
        };
        match platform.port_io() {
            Some(io) => {
                self.handle = Handle::Port { io, base };
                true
            }
            None => false,
        }
    }

    /// Fixes the addressing mode, mapping the register window if needed.
    ///
    /// # Errors
    ///
    /// Propagates the platform's mapping failure; the accessor stays
    /// unmapped and every read returns the existence sentinel.
    pub fn map(&mut self, platform: &'static dyn PlatformServices) -> Result<(), DriverError> {
        if !matches!(self.handle, Handle::Unmapped) || self.attach_port_io(platform) {
            return Ok(());
        }
        let window = platform.map_mmio(self.binding.io_base, u64::from(self.binding.io_size))?;
        self.handle = Handle::Mmio(window);
        Ok(())
    }

    /// Address register `index` resolves to under the current mode.
    ///
    /// An unattached I/O-port binding reports its port address; everything
    /// else reports the shifted physical address.
    #[must_use]
    pub fn effective_address(&self, index: u8) -> u64 {
        let port_like = match self.handle {
            Handle::Port { .. } => true,
            Handle::Mmio(_) => false,
            Handle::Unmapped => self.binding.is_io_port(),
        };
        if port_like {
            self.binding.io_base + u64::from(index)
        } else {
            self.binding.io_base + (u64::from(index) << self.binding.reg_shift)
        }
    }

    #[inline]
    fn mmio_offset(&self, index: u8) -> u64 {
        u64::from(index) << self.binding.reg_shift
    }

    /// Reads register `index`.
    #[must_use]
    pub fn read(&self, index: u8) -> u8 {
        match &self.handle {
            Handle::Unmapped => EXISTENCE_SENTINEL,
            Handle::Port { io, base } => io.read_u8(base.wrapping_add(u16::from(index))),
            Handle::Mmio(window) => {
                let offset = self.mmio_offset(index);
                match self.binding.reg_width {
                    RegWidth::Byte => window.read_u8(offset),
                    #[allow(clippy::cast_possible_truncation)]
                    RegWidth::Dword => window.read_u32(offset) as u8,
                }
            }
        }
    }

    /// Writes `value` to register `index`.
    pub fn write(&self, index: u8, value: u8) {
        match &self.handle {
            Handle::Unmapped => {}
            Handle::Port { io, base } => io.write_u8(base.wrapping_add(u16::from(index)), value),
            Handle::Mmio(window) => {
                let offset = self.mmio_offset(index);
                match self.binding.reg_width {
                    RegWidth::Byte => window.write_u8(offset, value),
                    RegWidth::Dword => window.write_u32(offset, u32::from(value)),
                }
            }
        }
    }

    /// `true` when IER reads as the existence sentinel, i.e. the device is
    /// removed, unpowered or not yet re-initialised by firmware. Every
    /// other register value is untrustworthy while this holds.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.read(reg::IER) == EXISTENCE_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SimPlatform, SimUart};

    #[test]
    fn width_from_bytes() {
        assert_eq!(RegWidth::try_from(1), Ok(RegWidth::Byte));
        assert_eq!(RegWidth::try_from(4), Ok(RegWidth::Dword));
        assert_eq!(
            RegWidth::try_from(2),
            Err(ConfigError::UnsupportedRegWidth(2))
        );
    }

    #[test]
    fn memory_mapped_address_is_shifted() {
        for width in [RegWidth::Byte, RegWidth::Dword] {
            for shift in 0..=3 {
                let binding = AddressBinding {
                    io_base: 0xFE00_0000,
                    io_size: 0x100,
                    reg_shift: shift,
                    reg_width: width,
                };
                let platform = SimPlatform::mmio_only(SimUart::with_shift(shift));
                let mut regs = RegisterAccess::new(binding);
                regs.map(platform).unwrap();
                assert_eq!(regs.mode(), AccessMode::MemoryMapped);
                for index in 0..8u8 {
                    assert_eq!(
                        regs.effective_address(index),
                        0xFE00_0000 + (u64::from(index) << shift)
                    );
                }
            }
        }
    }

    #[test]
    fn port_mapped_address_ignores_shift() {
        for shift in 0..=3 {
            let binding = AddressBinding {
                reg_shift: shift,
                ..AddressBinding::legacy(0x3F8)
            };
            let platform = SimPlatform::with_uart(SimUart::new());
            let mut regs = RegisterAccess::new(binding);
            regs.map(platform).unwrap();
            assert_eq!(regs.mode(), AccessMode::PortMapped);
            for index in 0..8u8 {
                assert_eq!(regs.effective_address(index), 0x3F8 + u64::from(index));
            }
        }
    }

    #[test]
    fn port_accesses_hit_base_plus_index() {
        let platform = SimPlatform::with_uart(SimUart::new());
        let mut regs = RegisterAccess::new(AddressBinding::legacy(0x2F8));
        assert!(regs.attach_port_io(platform));

        regs.write(reg::LCR, 0x03);
        let _ = regs.read(reg::LSR);

        let log = platform.uart().access_log();
        assert!(log.contains(&(0x2F8 + 3, true)));
        assert!(log.contains(&(0x2F8 + 5, false)));
    }

    #[test]
    fn dword_mmio_uses_shifted_offsets() {
        let platform = SimPlatform::mmio_only(SimUart::with_shift(2));
        let binding = AddressBinding {
            io_base: 0x1C02_0000,
            io_size: 0x20,
            reg_shift: 2,
            reg_width: RegWidth::Dword,
        };
        let mut regs = RegisterAccess::new(binding);
        regs.map(platform).unwrap();

        regs.write(reg::LCR, 0x1B);
        assert_eq!(regs.read(reg::LCR), 0x1B);
        assert!(platform.uart().access_log().contains(&(3 << 2, true)));
        assert_eq!(platform.uart().dword_accesses(), 2);
    }

    #[test]
    fn unmapped_reads_sentinel_and_drops_writes() {
        let regs = RegisterAccess::new(AddressBinding::legacy(0xFE00_0000));
        assert_eq!(regs.mode(), AccessMode::Unmapped);
        regs.write(reg::IER, 0);
        assert!(regs.is_unavailable());
    }

    #[test]
    fn mode_is_fixed_after_mapping() {
        let platform = SimPlatform::with_uart(SimUart::new());
        let mut regs = RegisterAccess::new(AddressBinding::legacy(0x3F8));
        regs.map(platform).unwrap();
        regs.map(platform).unwrap();
        assert_eq!(regs.mode(), AccessMode::PortMapped);
        assert_eq!(platform.mmio_maps(), 0);
    }

    #[test]
    fn io_port_without_io_space_falls_back_to_mmio() {
        let platform = SimPlatform::mmio_only(SimUart::new());
        let mut regs = RegisterAccess::new(AddressBinding::legacy(0x3F8));
        assert!(!regs.attach_port_io(platform));
        regs.map(platform).unwrap();
        assert_eq!(regs.mode(), AccessMode::MemoryMapped);
        assert_eq!(platform.mmio_maps(), 1);
    }

    #[test]
    fn removed_device_is_unavailable() {
        let platform = SimPlatform::with_uart(SimUart::new());
        let mut regs = RegisterAccess::new(AddressBinding::legacy(0x3F8));
        regs.map(platform).unwrap();
        assert!(!regs.is_unavailable());
        platform.uart().set_present(false);
        assert!(regs.is_unavailable());
    }
}
