//! Serial console drivers.

pub mod uart16550;
