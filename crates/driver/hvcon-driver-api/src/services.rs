//! Platform service contract for console drivers.

use alloc::boxed::Box;

use crate::error::DriverError;
use crate::io::{MmioWindow, PortIo};
use crate::pci::{PciAddress, PciConfigAccess};
use crate::timer::DeferredTimer;

/// Which of a port's two timers is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Recurring poll timer; expiry calls
    /// [`UartCallbacks::poll_tick`](crate::UartCallbacks::poll_tick).
    Poll,
    /// Resume retry timer; expiry calls
    /// [`UartCallbacks::resume_tick`](crate::UartCallbacks::resume_tick).
    ResumeRetry,
}

/// Services a platform provides to console drivers.
///
/// Optional capabilities (`port_io`, `pci_config`) return `None` on platforms
/// without them; the driver adapts instead of being built differently.
pub trait PlatformServices: Send + Sync {
    /// Legacy I/O-space access, if the platform has an I/O space.
    fn port_io(&self) -> Option<&dyn PortIo>;

    /// PCI configuration-space access, if the platform has PCI.
    fn pci_config(&self) -> Option<&dyn PciConfigAccess>;

    /// Maps `size` bytes of physical register space for uncached access.
    ///
    /// # Errors
    ///
    /// [`DriverError::Unsupported`] when the range cannot be mapped.
    fn map_mmio(&self, phys_base: u64, size: u64) -> Result<Box<dyn MmioWindow>, DriverError>;

    /// Creates a timer whose expiry is routed to the driver registered at
    /// `index`.
    fn create_timer(&self, index: usize, kind: TimerKind) -> Box<dyn DeferredTimer>;

    /// Claims interrupt line `irq` for the driver registered at `index`.
    ///
    /// # Errors
    ///
    /// [`DriverError::ResourceBusy`] when the line cannot be shared.
    fn register_irq(&self, irq: u32, index: usize, name: &'static str) -> Result<(), DriverError>;

    /// Revokes guest access to the I/O ports `first..=last`.
    ///
    /// # Errors
    ///
    /// [`DriverError::Unsupported`] when the I/O permission map cannot be
    /// changed.
    fn deny_guest_io_ports(&self, first: u16, last: u16) -> Result<(), DriverError>;

    /// Hides a PCI function from guest enumeration.
    fn hide_pci_device(&self, addr: PciAddress);
}
