//! Driver error types.

use core::fmt;

/// Errors reported by platform capabilities and driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The platform cannot provide the requested capability or mapping.
    Unsupported,
    /// The resource (IRQ line, registry slot) is already claimed.
    ResourceBusy,
    /// The device is present but transiently inaccessible.
    Unavailable,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => f.write_str("operation not supported"),
            Self::ResourceBusy => f.write_str("resource already in use"),
            Self::Unavailable => f.write_str("device temporarily unavailable"),
        }
    }
}

impl core::error::Error for DriverError {}
