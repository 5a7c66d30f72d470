//! 16550-family UART console driver.
//!
//! A port is resolved from platform defaults plus a descriptor string (or
//! from a device-tree node), probed, and handed to the console framework as
//! a [`ConsoleUart`]. From then on the framework drives it through two
//! configuration phases, the byte primitives, and the interrupt, poll and
//! resume-retry callbacks.
//!
//! # Submodules
//!
//! - [`access`] -- port-mapped or memory-mapped register access.
//! - [`probe`] -- existence and FIFO probing.
//! - [`line`] -- line format and baud programming.
//! - [`engine`] -- interrupt handler and polling fallback.
//! - [`power`] -- suspend and delayed resume.
//! - [`config`] -- defaults, descriptors and validation.
//! - [`devicetree`] -- device-tree entry point.

pub mod access;
pub mod config;
pub mod devicetree;
pub mod engine;
pub mod line;
pub mod power;
pub mod probe;
pub mod regs;

use alloc::boxed::Box;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use hvcon_driver_api::{
    ConsoleUart, DeferredTimer, DriverError, PlatformServices, PortIndex, SerialLine,
    UartCallbacks, UartIo, UartRegistrar,
};

use self::access::{AccessMode, AddressBinding, RegisterAccess};
use self::config::{ConfigError, PortDescriptor, PortSettings, UartDefaults};
use self::devicetree::VuartInfo;
use self::engine::IrqMode;
use self::line::LineParams;
use crate::pci::serial::{self as pci_serial, PciLocation};

/// Standard UART input clock: 1.8432 MHz.
pub const UART_CLOCK_HZ: u32 = 1_843_200;

/// Why a port was left unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// No descriptor and no default baud; the port is simply unused.
    NotConfigured,
    /// Descriptor or settings rejected.
    Config(ConfigError),
    /// PCI discovery requested but the platform has no configuration access.
    PciUnavailable,
    /// A `pci` scan found no serial card.
    PciNotFound,
    /// Existence probe failed.
    NotPresent,
    /// The console framework refused the port.
    Registration(DriverError),
}

impl From<ConfigError> for InitError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("not configured"),
            Self::Config(err) => write!(f, "{err}"),
            Self::PciUnavailable => f.write_str("PCI discovery requested without PCI access"),
            Self::PciNotFound => f.write_str("no PCI serial card found"),
            Self::NotPresent => f.write_str("16550-compatible serial UART not present"),
            Self::Registration(err) => write!(f, "registration failed: {err}"),
        }
    }
}

impl core::error::Error for InitError {}

/// One 16550 port.
pub struct Ns16550 {
    index: PortIndex,
    params: LineParams,
    /// 1 until the FIFO probe succeeds, then 16.
    fifo_size: u32,
    irq: IrqMode,
    timeout_ms: u32,
    /// Set by the interrupt handler; cleared only by `setup_pre_interrupt`.
    intr_works: AtomicBool,
    busy_erratum: bool,
    regs: RegisterAccess,
    pci: Option<PciLocation>,
    vuart: Option<VuartInfo>,
    platform: &'static dyn PlatformServices,
    poll_timer: Option<Box<dyn DeferredTimer>>,
    resume_timer: Option<Box<dyn DeferredTimer>>,
    resume_tries: u32,
    configured: bool,
}

impl fmt::Debug for Ns16550 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ns16550")
            .field("index", &self.index)
            .field("params", &self.params)
            .field("fifo_size", &self.fifo_size)
            .field("irq", &self.irq)
            .field("regs", &self.regs)
            .field("pci", &self.pci)
            .finish_non_exhaustive()
    }
}

impl Ns16550 {
    fn new(
        index: PortIndex,
        settings: &PortSettings,
        params: LineParams,
        platform: &'static dyn PlatformServices,
    ) -> Self {
        Self {
            index,
            params,
            fifo_size: 1,
            irq: settings.irq,
            timeout_ms: 1,
            intr_works: AtomicBool::new(false),
            busy_erratum: settings.busy_erratum,
            regs: RegisterAccess::new(settings.binding),
            pci: settings.pci,
            vuart: None,
            platform,
            poll_timer: None,
            resume_timer: None,
            resume_tries: 0,
            configured: false,
        }
    }

    /// Port slot.
    #[must_use]
    pub const fn index(&self) -> PortIndex {
        self.index
    }

    /// Line settings; the baud is the read-back rate after an auto setup.
    #[must_use]
    pub const fn params(&self) -> &LineParams {
        &self.params
    }

    /// Register location.
    #[must_use]
    pub const fn binding(&self) -> &AddressBinding {
        self.regs.binding()
    }

    /// FIFO depth: 1 or 16.
    #[must_use]
    pub const fn fifo_size(&self) -> u32 {
        self.fifo_size
    }

    /// Interrupt configuration.
    #[must_use]
    pub const fn irq_mode(&self) -> IrqMode {
        self.irq
    }

    /// PCI attachment, if any.
    #[must_use]
    pub const fn pci_location(&self) -> Option<&PciLocation> {
        self.pci.as_ref()
    }

    /// Guest-visible UART description, for device-tree ports.
    #[must_use]
    pub const fn vuart_info(&self) -> Option<&VuartInfo> {
        self.vuart.as_ref()
    }

    /// Interrupt line, for interrupt-driven ports only.
    #[must_use]
    pub const fn assigned_irq(&self) -> Option<u32> {
        match self.irq {
            IrqMode::Line(line) => Some(line),
            IrqMode::Disabled | IrqMode::Polled => None,
        }
    }

    fn early_init(&self) {
        if let (Some(location), Some(pci)) = (&self.pci, self.platform.pci_config()) {
            pci_serial::early_init(pci, location, self.regs.binding().io_base);
        }
    }

    /// Runs the existence probe through legacy port I/O.
    fn probe_existence(&mut self) -> bool {
        self.early_init();
        self.regs.attach_port_io(self.platform);
        probe::check_existence(&self.regs)
    }

    /// Pre-interrupt configuration: maps the registers, programs line and
    /// baud, detects the FIFO.
    pub fn init_pre_interrupt(&mut self) {
        if let Err(err) = self.regs.map(self.platform) {
            hvcon_core::kerr!(
                "ns16550: {}: cannot map registers at {:#x}: {err}",
                self.index,
                self.regs.binding().io_base
            );
            return;
        }
        self.setup_pre_interrupt();

        if self.fifo_size <= 1 && probe::detect_fifo(&self.regs) {
            self.fifo_size = 16;
        }
    }

    /// The part of pre-interrupt configuration that resume repeats.
    fn setup_pre_interrupt(&mut self) {
        self.intr_works.store(false, Ordering::Release);
        self.early_init();
        line::program(&self.regs, &mut self.params, self.busy_erratum);
        self.configured = true;
    }

    /// Post-interrupt configuration: timers, interrupt line, engine start.
    pub fn init_post_interrupt(&mut self) {
        self.start_engine();
    }

    /// Takes the I/O ports away from the control domain.
    pub fn end_of_boot(&mut self) {
        if self.regs.mode() != AccessMode::PortMapped {
            return;
        }
        let Ok(first) = u16::try_from(self.regs.binding().io_base) else {
            return;
        };
        let last = first.saturating_add(7);
        if let Err(err) = self.platform.deny_guest_io_ports(first, last) {
            hvcon_core::kwarn!(
                "ns16550: {}: cannot revoke ports {first:#x}-{last:#x}: {err}",
                self.index
            );
        }
    }
}

impl UartIo for Ns16550 {
    fn transmit_ready(&self) -> Result<u32, DriverError> {
        Self::transmit_ready(self)
    }

    fn put_byte(&self, byte: u8) {
        Self::put_byte(self, byte);
    }

    fn get_byte(&self) -> Option<u8> {
        Self::get_byte(self)
    }
}

impl UartCallbacks for Ns16550 {
    fn handle_interrupt(&self, line: &dyn SerialLine) {
        Self::handle_interrupt(self, line);
    }

    fn poll_tick(&self, line: &dyn SerialLine) {
        Self::poll_tick(self, line);
    }

    fn resume_tick(&mut self) {
        Self::resume_tick(self);
    }
}

impl ConsoleUart for Ns16550 {
    fn init_pre_interrupt(&mut self) {
        Self::init_pre_interrupt(self);
    }

    fn init_post_interrupt(&mut self) {
        Self::init_post_interrupt(self);
    }

    fn end_of_boot(&mut self) {
        Self::end_of_boot(self);
    }

    fn suspend(&mut self) {
        Self::suspend(self);
    }

    fn resume(&mut self) {
        Self::resume(self);
    }

    fn assigned_irq(&self) -> Option<u32> {
        Self::assigned_irq(self)
    }
}

/// Resolves, validates and probes a port without registering it.
///
/// An empty `descriptor` keeps the platform defaults, and leaves the port
/// unconfigured when those carry no baud rate.
///
/// # Errors
///
/// See [`InitError`].
pub fn resolve_port(
    index: PortIndex,
    defaults: &UartDefaults,
    descriptor: &str,
    platform: &'static dyn PlatformServices,
) -> Result<Ns16550, InitError> {
    let mut settings = PortSettings::from_defaults(defaults);
    if descriptor.is_empty() {
        if settings.baud.is_none() {
            return Err(InitError::NotConfigured);
        }
    } else {
        let desc = PortDescriptor::parse(descriptor)?;
        settings.apply(&desc, index, platform.pci_config())?;
    }

    let params = settings.validate()?;
    let mut port = Ns16550::new(index, &settings, params, platform);
    if !port.probe_existence() {
        return Err(InitError::NotPresent);
    }
    Ok(port)
}

/// Boot-time entry point for a legacy or PCI port.
///
/// Rejections are logged and the port stays unregistered; an unconfigured
/// port is skipped silently.
///
/// # Errors
///
/// The reason the port was not registered.
pub fn ns16550_init(
    index: PortIndex,
    defaults: &UartDefaults,
    descriptor: &str,
    platform: &'static dyn PlatformServices,
    registrar: &mut dyn UartRegistrar,
) -> Result<(), InitError> {
    let result = resolve_port(index, defaults, descriptor, platform).and_then(|port| {
        hvcon_core::kinfo!(
            "ns16550: {index}: {:#x} irq {} {}",
            port.binding().io_base,
            port.irq.raw(),
            port.params
        );
        registrar
            .register_uart(index, Box::new(port))
            .map_err(InitError::Registration)
    });
    match &result {
        Ok(()) | Err(InitError::NotConfigured) => {}
        Err(err) => hvcon_core::kerr!("ns16550: {index}: {err}"),
    }
    result
}
