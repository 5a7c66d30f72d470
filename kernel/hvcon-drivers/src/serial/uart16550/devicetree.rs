//! Device-tree entry point.
//!
//! Firmware that describes the UART in a device tree has already chosen
//! its address, stride and interrupt, so none of that is probed: the port
//! is registered as [`PortIndex::Com1`] with auto baud and 8N1.

use hvcon_driver_api::{PlatformServices, PortIndex, UartRegistrar};

use alloc::boxed::Box;

use super::access::{AddressBinding, RegWidth};
use super::config::PortSettings;
use super::engine::IrqMode;
use super::line::{Baud, Parity};
use super::regs::{Lsr, reg};
use super::{InitError, Ns16550, UART_CLOCK_HZ};

/// Compatible strings this driver binds to.
pub const NS16550_DT_COMPAT: [&str; 2] = ["ns16550", "snps,dw-apb-uart"];

/// Compatible string of the DesignWare APB UART, which needs the
/// busy-detect workaround.
const DESIGNWARE_COMPAT: &str = "snps,dw-apb-uart";

/// The properties of a UART node the driver consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtUartNode<'a> {
    /// `compatible` entries.
    pub compatible: &'a [&'a str],
    /// First `reg` entry: physical base.
    pub base: u64,
    /// First `reg` entry: size.
    pub size: u64,
    /// `reg-shift`, if present.
    pub reg_shift: Option<u32>,
    /// `reg-io-width`, if present.
    pub reg_io_width: Option<u32>,
    /// First interrupt.
    pub irq: u32,
}

impl DtUartNode<'_> {
    /// Whether any compatible entry is handled by this driver.
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.compatible
            .iter()
            .any(|c| NS16550_DT_COMPAT.contains(c))
    }

    fn is_designware(&self) -> bool {
        self.compatible.contains(&DESIGNWARE_COMPAT)
    }
}

/// What a guest needs to drive the UART as a write-only console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VuartInfo {
    /// Physical base of the register window.
    pub base_addr: u64,
    /// Window size.
    pub size: u64,
    /// Offset of the transmit register.
    pub data_off: u64,
    /// Offset of the line status register.
    pub status_off: u64,
    /// Status bits meaning "ready to send".
    pub status: u32,
}

impl VuartInfo {
    fn for_binding(binding: &AddressBinding, size: u64) -> Self {
        Self {
            base_addr: binding.io_base,
            size,
            data_off: u64::from(reg::THR) << binding.reg_shift,
            status_off: u64::from(reg::LSR) << binding.reg_shift,
            status: u32::from((Lsr::THR_EMPTY | Lsr::TRANSMITTER_EMPTY).bits()),
        }
    }
}

/// Builds a port from a device-tree node without registering it.
///
/// # Errors
///
/// `UnsupportedRegWidth` for a `reg-io-width` other than 1 or 4,
/// `UnsupportedRegShift` for an oversized stride and `MissingIoBase` for a
/// zero base.
pub fn resolve_dt_port(
    node: &DtUartNode<'_>,
    platform: &'static dyn PlatformServices,
) -> Result<Ns16550, InitError> {
    let reg_width = RegWidth::try_from(node.reg_io_width.unwrap_or(1))?;
    let io_size = u32::try_from(node.size).unwrap_or(u32::MAX);
    let binding = AddressBinding {
        io_base: node.base,
        io_size,
        reg_shift: node.reg_shift.unwrap_or(0),
        reg_width,
    };
    let settings = PortSettings {
        baud: Some(Baud::Auto),
        clock_hz: UART_CLOCK_HZ,
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
        irq: IrqMode::from_line(node.irq),
        binding,
        pci: None,
        busy_erratum: node.is_designware(),
    };
    let params = settings.validate()?;

    let mut port = Ns16550::new(PortIndex::Com1, &settings, params, platform);
    port.vuart = Some(VuartInfo::for_binding(&binding, node.size));
    Ok(port)
}

/// Device-tree entry point: registers the node's UART as COM1.
///
/// # Errors
///
/// The reason the port was not registered; also logged.
pub fn ns16550_dt_init(
    node: &DtUartNode<'_>,
    platform: &'static dyn PlatformServices,
    registrar: &mut dyn UartRegistrar,
) -> Result<(), InitError> {
    let result = resolve_dt_port(node, platform).and_then(|port| {
        hvcon_core::kinfo!(
            "ns16550: dt: {:#x} shift {} irq {}",
            node.base,
            port.binding().reg_shift,
            node.irq
        );
        registrar
            .register_uart(PortIndex::Com1, Box::new(port))
            .map_err(InitError::Registration)
    });
    if let Err(err) = &result {
        hvcon_core::kerr!("ns16550: dt: {err}");
    }
    result
}
