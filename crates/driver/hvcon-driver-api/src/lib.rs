//! Platform capabilities and console-framework interfaces for hvcon drivers.
//!
//! The driver core is written once against these traits. What a platform can
//! do is expressed by which capabilities it hands out, not by build flags:
//!
//! - **Register access** -- [`PortIo`] for legacy I/O space, [`MmioWindow`]
//!   for mapped register windows.
//! - **Bus access** -- [`PciConfigAccess`] for configuration space.
//! - **Deferred work** -- [`DeferredTimer`] one-shot timers.
//! - **Platform** -- [`PlatformServices`] bundles the above with mapping,
//!   interrupt registration and I/O-space policy.
//! - **Console framework** -- [`UartIo`], [`UartCallbacks`], [`ConsoleUart`],
//!   [`SerialLine`] and [`UartRegistrar`] form the boundary with the generic
//!   serial line layer.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod console;
pub mod error;
pub mod io;
pub mod pci;
pub mod services;
pub mod timer;

pub use console::{ConsoleUart, PortIndex, SerialLine, UartCallbacks, UartIo, UartRegistrar};
pub use error::DriverError;
pub use io::{MmioWindow, PortIo, VolatileWindow};
pub use pci::{PciAddress, PciConfigAccess};
pub use services::{PlatformServices, TimerKind};
pub use timer::DeferredTimer;
