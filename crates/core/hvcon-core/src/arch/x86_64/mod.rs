//! x86_64 primitives.

mod port;

pub use port::{Port, PortRead, PortWrite};
