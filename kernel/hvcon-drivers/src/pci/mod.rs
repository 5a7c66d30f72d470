//! PCI support for console UARTs.
//!
//! - [`cam`] -- legacy configuration access through ports 0xCF8/0xCFC.
//! - [`serial`] -- discovery of plug-in serial cards and their BAR upkeep.

#[cfg(target_arch = "x86_64")]
pub mod cam;
pub mod serial;
