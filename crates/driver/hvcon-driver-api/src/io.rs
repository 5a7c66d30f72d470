//! Register access capabilities.
//!
//! A UART's registers live either in the legacy I/O space ([`PortIo`]) or in
//! a mapped memory window ([`MmioWindow`]). Both are raw, side-effecting
//! accessors with no locking; callers own serialization.

/// Legacy I/O-space access.
pub trait PortIo: Send + Sync {
    /// Reads one byte from `port`.
    fn read_u8(&self, port: u16) -> u8;

    /// Writes one byte to `port`.
    fn write_u8(&self, port: u16, value: u8);
}

/// A mapped memory window addressed by byte offset.
///
/// Handed out by [`PlatformServices::map_mmio`](crate::PlatformServices::map_mmio)
/// and owned exclusively by the driver instance that requested it.
pub trait MmioWindow: Send + Sync {
    /// Size of the window in bytes.
    fn size(&self) -> u64;

    /// Performs an 8-bit load at `offset`.
    fn read_u8(&self, offset: u64) -> u8;

    /// Performs a 32-bit load at `offset`.
    fn read_u32(&self, offset: u64) -> u32;

    /// Performs an 8-bit store at `offset`.
    fn write_u8(&self, offset: u64, value: u8);

    /// Performs a 32-bit store at `offset`.
    fn write_u32(&self, offset: u64, value: u32);
}

/// An [`MmioWindow`] over a virtual mapping, accessed with volatile loads
/// and stores.
///
/// Out-of-range reads return all-ones and out-of-range writes are dropped,
/// which is indistinguishable from an absent device.
#[derive(Debug)]
pub struct VolatileWindow {
    base: *mut u8,
    size: u64,
}

// SAFETY: the window is plain device memory; every access is a single
// volatile load or store and callers serialize multi-register sequences.
unsafe impl Send for VolatileWindow {}
// SAFETY: see above.
unsafe impl Sync for VolatileWindow {}

impl VolatileWindow {
    /// Wraps an existing mapping.
    ///
    /// # Safety
    ///
    /// `[base, base + size)` must be mapped uncached device memory for the
    /// whole lifetime of the window and must not be handed to anyone else.
    #[must_use]
    pub const unsafe fn new(base: *mut u8, size: u64) -> Self {
        Self { base, size }
    }

    #[inline]
    fn ptr(&self, offset: u64, width: u64) -> Option<*mut u8> {
        let end = offset.checked_add(width)?;
        if end > self.size {
            return None;
        }
        let offset = usize::try_from(offset).ok()?;
        // SAFETY: `offset + width <= size`, so the result stays in the mapping.
        Some(unsafe { self.base.add(offset) })
    }
}

impl MmioWindow for VolatileWindow {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_u8(&self, offset: u64) -> u8 {
        match self.ptr(offset, 1) {
            // SAFETY: in-bounds pointer into device memory.
            Some(ptr) => unsafe { ptr.read_volatile() },
            None => 0xFF,
        }
    }

    fn read_u32(&self, offset: u64) -> u32 {
        match self.ptr(offset, 4) {
            // SAFETY: in-bounds; 32-bit registers are naturally aligned.
            Some(ptr) => unsafe { ptr.cast::<u32>().read_volatile() },
            None => 0xFFFF_FFFF,
        }
    }

    fn write_u8(&self, offset: u64, value: u8) {
        if let Some(ptr) = self.ptr(offset, 1) {
            // SAFETY: in-bounds pointer into device memory.
            unsafe { ptr.write_volatile(value) };
        }
    }

    fn write_u32(&self, offset: u64, value: u32) {
        if let Some(ptr) = self.ptr(offset, 4) {
            // SAFETY: in-bounds; 32-bit registers are naturally aligned.
            unsafe { ptr.cast::<u32>().write_volatile(value) };
        }
    }
}

/// [`PortIo`] backed by the `in`/`out` instructions.
#[cfg(target_arch = "x86_64")]
#[derive(Debug)]
pub struct X86PortIo {
    _private: (),
}

#[cfg(target_arch = "x86_64")]
impl X86PortIo {
    /// Creates the accessor.
    ///
    /// # Safety
    ///
    /// The caller must run at an I/O privilege level that permits port
    /// access, and must only hand the accessor to drivers that own the ports
    /// they touch.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl PortIo for X86PortIo {
    fn read_u8(&self, port: u16) -> u8 {
        use hvcon_core::arch::x86_64::Port;
        // SAFETY: construction of `X86PortIo` vouches for port access.
        unsafe { Port::<u8>::new(port).read() }
    }

    fn write_u8(&self, port: u16, value: u8) {
        use hvcon_core::arch::x86_64::Port;
        // SAFETY: construction of `X86PortIo` vouches for port access.
        unsafe { Port::<u8>::new(port).write(value) }
    }
}
