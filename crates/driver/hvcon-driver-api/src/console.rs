//! Boundary with the generic serial console framework.
//!
//! The framework owns character queues and line discipline. A UART driver
//! registers an object implementing [`ConsoleUart`] under a [`PortIndex`];
//! the framework drives its lifecycle and byte primitives, and the driver
//! reports hardware events back through [`SerialLine`].

use alloc::boxed::Box;
use core::fmt;

use crate::error::DriverError;

/// One of the two console UART slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortIndex {
    /// First console UART.
    Com1,
    /// Second console UART.
    Com2,
}

impl PortIndex {
    /// Both slots, in index order.
    pub const ALL: [Self; 2] = [Self::Com1, Self::Com2];

    /// Zero-based slot number.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Com1 => 0,
            Self::Com2 => 1,
        }
    }

    /// Console name (`com1`, `com2`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Com1 => "com1",
            Self::Com2 => "com2",
        }
    }

    /// Slot for a zero-based index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Com1),
            1 => Some(Self::Com2),
            _ => None,
        }
    }
}

impl fmt::Display for PortIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte-level primitives the framework calls from any context.
pub trait UartIo: Send + Sync {
    /// Returns how many bytes may be written without checking again.
    ///
    /// `Ok(0)` means the device is present but its transmitter is busy.
    ///
    /// # Errors
    ///
    /// [`DriverError::Unavailable`] when the device does not answer.
    fn transmit_ready(&self) -> Result<u32, DriverError>;

    /// Writes one byte. The caller has already seen a non-zero
    /// [`transmit_ready`](Self::transmit_ready).
    fn put_byte(&self, byte: u8);

    /// Reads one byte if the device is present and has one.
    fn get_byte(&self) -> Option<u8>;
}

/// Entry points the platform's interrupt and timer subsystems call.
///
/// Contract for implementors and callers alike:
///
/// - None of these may block or wait for hardware; each completes in a
///   bounded number of register accesses.
/// - [`poll_tick`](Self::poll_tick) is never re-entered for the same port,
///   but may race with [`handle_interrupt`](Self::handle_interrupt).
/// - [`resume_tick`](Self::resume_tick) takes `&mut self`: the platform runs
///   it on the same control path as suspend/resume, never concurrently with
///   the other two.
pub trait UartCallbacks {
    /// Services the port's interrupt line.
    fn handle_interrupt(&self, line: &dyn SerialLine);

    /// Poll timer expiry.
    fn poll_tick(&self, line: &dyn SerialLine);

    /// Resume retry timer expiry.
    fn resume_tick(&mut self);
}

/// The operation table a console UART driver registers.
pub trait ConsoleUart: UartIo + UartCallbacks {
    /// Configuration that must complete before interrupts are enabled.
    fn init_pre_interrupt(&mut self);

    /// Claims the interrupt line, arms timers, enables UART interrupts.
    fn init_post_interrupt(&mut self);

    /// Called once when boot finishes and guests are about to start.
    fn end_of_boot(&mut self);

    /// Prepares for a platform sleep transition.
    fn suspend(&mut self);

    /// Recovers after a platform sleep transition.
    fn resume(&mut self);

    /// Interrupt line in use, if the port is interrupt-driven.
    fn assigned_irq(&self) -> Option<u32>;
}

/// Upcalls into the framework, made from interrupt or poll context.
pub trait SerialLine {
    /// The transmitter can accept more bytes; the framework may call
    /// [`UartIo::put_byte`] on `uart`.
    fn signal_transmit_ready(&self, uart: &dyn UartIo);

    /// A byte is waiting; the framework is expected to call
    /// [`UartIo::get_byte`] on `uart`.
    fn signal_receive_data(&self, uart: &dyn UartIo);
}

/// Framework-side registration of console UARTs.
pub trait UartRegistrar {
    /// Takes ownership of `uart` under `index`.
    ///
    /// # Errors
    ///
    /// [`DriverError::ResourceBusy`] if the slot is already taken.
    fn register_uart(
        &mut self,
        index: PortIndex,
        uart: Box<dyn ConsoleUart>,
    ) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        for port in PortIndex::ALL {
            assert_eq!(PortIndex::from_index(port.index()), Some(port));
        }
        assert_eq!(PortIndex::from_index(2), None);
        assert_eq!(format!("{}", PortIndex::Com2), "com2");
    }
}
