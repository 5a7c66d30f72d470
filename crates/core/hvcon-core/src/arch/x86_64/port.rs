//! Typed legacy I/O port access.
//!
//! [`Port<T>`] wraps the `in`/`out` instructions for a fixed port number.
//! Only the byte and dword widths are provided: UART registers are byte
//! wide and PCI CAM uses dword transfers.

use core::marker::PhantomData;

/// A value that can be read from an I/O port.
///
/// # Safety
///
/// Implementations must issue the `in` variant matching the type size.
pub unsafe trait PortRead: Sized {
    /// Reads a value from `port`.
    ///
    /// # Safety
    ///
    /// `port` must be a valid I/O port whose read side effects are acceptable.
    unsafe fn read_from_port(port: u16) -> Self;
}

/// A value that can be written to an I/O port.
///
/// # Safety
///
/// Implementations must issue the `out` variant matching the type size.
pub unsafe trait PortWrite: Sized {
    /// Writes `value` to `port`.
    ///
    /// # Safety
    ///
    /// `port` must be a valid I/O port whose write side effects are acceptable.
    unsafe fn write_to_port(port: u16, value: Self);
}

macro_rules! impl_port_rw {
    ($ty:ty, $reg:tt) => {
        // SAFETY: the accumulator register named here matches the width of `$ty`.
        unsafe impl PortRead for $ty {
            #[inline]
            unsafe fn read_from_port(port: u16) -> Self {
                let value: $ty;
                unsafe {
                    core::arch::asm!(
                        concat!("in ", $reg, ", dx"),
                        in("dx") port,
                        out($reg) value,
                        options(nomem, nostack, preserves_flags),
                    );
                }
                value
            }
        }

        // SAFETY: the accumulator register named here matches the width of `$ty`.
        unsafe impl PortWrite for $ty {
            #[inline]
            unsafe fn write_to_port(port: u16, value: Self) {
                unsafe {
                    core::arch::asm!(
                        concat!("out dx, ", $reg),
                        in("dx") port,
                        in($reg) value,
                        options(nomem, nostack, preserves_flags),
                    );
                }
            }
        }
    };
}

impl_port_rw!(u8, "al");
impl_port_rw!(u32, "eax");

/// An I/O port at a fixed address. Constructing one performs no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port<T> {
    port: u16,
    _width: PhantomData<T>,
}

impl<T: PortRead + PortWrite> Port<T> {
    /// Creates a handle for `port`.
    #[inline]
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            _width: PhantomData,
        }
    }

    /// Returns the port number.
    #[inline]
    #[must_use]
    pub const fn number(&self) -> u16 {
        self.port
    }

    /// Reads from the port.
    ///
    /// # Safety
    ///
    /// The port must be valid and safe to read.
    #[inline]
    pub unsafe fn read(&self) -> T {
        unsafe { T::read_from_port(self.port) }
    }

    /// Writes to the port.
    ///
    /// # Safety
    ///
    /// The port must be valid and safe to write.
    #[inline]
    pub unsafe fn write(&self, value: T) {
        unsafe { T::write_to_port(self.port, value) }
    }
}
