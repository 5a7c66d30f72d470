//! Discovery and upkeep of PCI serial cards.
//!
//! The scan walks configuration space looking for a serial-class function
//! with an 8-byte I/O BAR, the footprint of a single 16550. Once found, the
//! card's BAR and command register must be re-applied whenever firmware or a
//! sleep transition may have cleared them, so [`early_init`] is idempotent
//! and runs before every configuration pass.

use core::fmt;

use hvcon_driver_api::pci::regs;
use hvcon_driver_api::{PciAddress, PciConfigAccess};

/// Legacy COM1 port used when an `amt` scan finds no card.
pub const LEGACY_IO_BASE: u64 = 0x3F8;

/// Class/subclass words accepted as serial controllers.
const SERIAL_CLASSES: [u16; 3] = [
    0x0700, // 16450/16550 single port
    0x0702, // multiport serial
    0x0780, // other communications (serial + parallel combos)
];

/// I/O BAR sizing mask (low 16 bits) of an 8-byte window.
const EIGHT_BYTE_IO_MASK: u32 = 0xFFF9;

/// Which part of the bus hierarchy to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Start at bus 1. Bus 0 hosts on-board functions, including the AMT
    /// management controller's serial-over-LAN port, which a plug-in card
    /// can never be. Finding nothing is a discovery failure.
    SkipBusZero,
    /// Start at bus 0. Finding nothing falls back to the legacy COM1 port in
    /// polled mode.
    AllBuses,
}

impl ScanMode {
    const fn first_bus(self) -> u16 {
        match self {
            Self::SkipBusZero => 1,
            Self::AllBuses => 0,
        }
    }
}

/// A serial function accepted by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciSerialMatch {
    /// Function address.
    pub address: PciAddress,
    /// BAR index that was inspected.
    pub bar_index: u8,
    /// Raw BAR value, including the I/O space flag.
    pub bar: u32,
    /// I/O port base derived from the BAR.
    pub io_base: u64,
    /// Interrupt line, or 0 when the function has no interrupt pin.
    pub irq: u32,
}

/// Result of [`discover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// A card was found.
    Card(PciSerialMatch),
    /// Nothing found; use [`LEGACY_IO_BASE`], polled.
    LegacyFallback,
}

/// Scans for a serial card, applying the fallback policy of `mode`.
#[must_use]
pub fn discover(pci: &dyn PciConfigAccess, mode: ScanMode, bar_index: u8) -> Option<Discovery> {
    match scan(pci, mode, bar_index) {
        Some(found) => Some(Discovery::Card(found)),
        None if mode == ScanMode::AllBuses => Some(Discovery::LegacyFallback),
        None => None,
    }
}

/// Walks every bus/device/function from `mode`'s first bus and returns the
/// first serial function whose BAR `bar_index` is an 8-byte I/O window.
#[must_use]
pub fn scan(pci: &dyn PciConfigAccess, mode: ScanMode, bar_index: u8) -> Option<PciSerialMatch> {
    for bus in mode.first_bus()..=0xFF {
        #[allow(clippy::cast_possible_truncation)]
        let bus = bus as u8;
        for device in 0..0x20u8 {
            let mut function = 0u8;
            while function < 8 {
                let addr = PciAddress {
                    bus,
                    device,
                    function,
                };
                // Functions 1-7 only exist behind a multi-function header.
                let multi = function != 0
                    || pci.read_u8(addr, regs::HEADER_TYPE) & regs::HEADER_MULTI_FUNCTION != 0;
                let next = if multi { function + 1 } else { 8 };

                let class = pci.read_u16(addr, regs::CLASS_DEVICE);
                if class == 0xFFFF && function == 0 {
                    break;
                }
                if SERIAL_CLASSES.contains(&class) {
                    if let Some(found) = probe_bar(pci, addr, bar_index) {
                        return Some(found);
                    }
                }
                function = next;
            }
        }
    }
    None
}

/// Checks that BAR `bar_index` of `addr` decodes an 8-byte I/O window.
fn probe_bar(pci: &dyn PciConfigAccess, addr: PciAddress, bar_index: u8) -> Option<PciSerialMatch> {
    let offset = regs::bar(bar_index);
    let bar = pci.read_u32(addr, offset);
    if bar & regs::BAR_SPACE_IO == 0 {
        return None;
    }

    pci.write_u32(addr, offset, 0xFFFF_FFFF);
    let mask = pci.read_u32(addr, offset);
    pci.write_u32(addr, offset, bar);

    if mask & 0xFFFF != EIGHT_BYTE_IO_MASK {
        return None;
    }

    let irq = if pci.read_u8(addr, regs::INTERRUPT_PIN) != 0 {
        u32::from(pci.read_u8(addr, regs::INTERRUPT_LINE))
    } else {
        0
    };

    Some(PciSerialMatch {
        address: addr,
        bar_index,
        bar,
        io_base: u64::from(bar & !regs::BAR_SPACE_IO),
        irq,
    })
}

/// BAR found by a scan; written back verbatim on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedBar {
    /// BAR index.
    pub index: u8,
    /// Raw BAR value.
    pub value: u32,
}

/// Where a PCI-attached UART sits and what must be restored around
/// power transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciLocation {
    /// The serial function.
    pub function: PciAddress,
    /// Upstream bridge whose I/O window must cover the port.
    pub bridge: Option<PciAddress>,
    /// Coordinates came from configuration: reprogram BAR0 and the command
    /// register before every configuration pass.
    pub reprogram: bool,
    /// BAR recorded by the scan, restored on resume.
    pub bar: Option<ScannedBar>,
    /// Command register captured at suspend.
    pub saved_command: u16,
}

impl PciLocation {
    /// Location of a scanned card.
    #[must_use]
    pub const fn scanned(found: &PciSerialMatch) -> Self {
        Self {
            function: found.address,
            bridge: None,
            reprogram: false,
            bar: Some(ScannedBar {
                index: found.bar_index,
                value: found.bar,
            }),
            saved_command: 0,
        }
    }

    /// Location given explicitly by configuration.
    #[must_use]
    pub const fn configured(function: PciAddress) -> Self {
        Self {
            function,
            bridge: None,
            reprogram: true,
            bar: None,
            saved_command: 0,
        }
    }
}

impl fmt::Display for PciLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function)?;
        if let Some(bridge) = self.bridge {
            write!(f, " via {bridge}")?;
        }
        Ok(())
    }
}

/// Re-applies the bridge I/O window and the card's BAR0/command register.
///
/// Only for explicitly configured cards with an I/O-port base; does nothing
/// otherwise. Safe to call any number of times.
pub fn early_init(pci: &dyn PciConfigAccess, location: &PciLocation, io_base: u64) {
    if !location.reprogram {
        return;
    }
    let Ok(port) = u16::try_from(io_base) else {
        return;
    };

    if let Some(bridge) = location.bridge {
        // Base and limit both name the 4K page holding the port.
        let page = port & 0xF000;
        pci.write_u16(bridge, regs::IO_BASE, page | (page >> 8));
    }
    pci.write_u32(
        location.function,
        regs::BAR0,
        u32::from(port) | regs::BAR_SPACE_IO,
    );
    pci.write_u16(location.function, regs::COMMAND, regs::COMMAND_IO);
}
