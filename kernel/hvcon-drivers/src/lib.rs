//! Console UART drivers for the hypervisor.
//!
//! The 16550 driver works against [`hvcon_driver_api::PlatformServices`],
//! so the same code runs over legacy port I/O, memory-mapped windows and
//! host-side simulators.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// ── Subsystem modules ───────────────────────────────────────────────────

pub mod pci;
pub mod registry;
pub mod serial;

#[cfg(test)]
mod testing;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use self::registry::ConsoleRegistry;
pub use self::serial::uart16550;
pub use self::serial::uart16550::{InitError, Ns16550, ns16550_init};
pub use self::serial::uart16550::devicetree::ns16550_dt_init;
