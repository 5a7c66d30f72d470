//! Port configuration: platform defaults, descriptor strings and validation.
//!
//! A descriptor has the form
//!
//! ```text
//! baud[/clock_hz][,DPS[,io_base[,irq[,port-bdf[,bridge-bdf]]]]]
//! ```
//!
//! `baud` may be `auto`, `DPS` is data bits, parity letter and stop bits
//! (`8n1`), and `io_base` may be `pci` or `amt` to request a PCI scan.
//! Empty fields keep the platform default.

use core::fmt;

use hvcon_driver_api::{PciAddress, PciConfigAccess, PortIndex};

use super::InitError;
use super::UART_CLOCK_HZ;
use super::access::AddressBinding;
use super::engine::IrqMode;
use super::line::{Baud, LineParams, MAX_BAUD, MIN_BAUD, Parity};
use crate::pci::serial::{self, Discovery, PciLocation, ScanMode};

/// Largest register stride accepted from firmware.
pub const MAX_REG_SHIFT: u32 = 12;

/// A descriptor or setting was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Baud field is neither `auto` nor a decimal number.
    BadBaud,
    /// Clock field is not a number, or is zero.
    BadClock,
    /// Data-bits digit missing.
    BadDataBits,
    /// Unknown parity letter.
    BadParity(char),
    /// Stop-bits digit missing.
    BadStopBits,
    /// I/O base is not a number, `pci` or `amt`.
    BadIoBase,
    /// IRQ is not a decimal number.
    BadIrq,
    /// Port PCI coordinates do not parse.
    BadPortBdf,
    /// Bridge PCI coordinates do not parse.
    BadBridgeBdf,
    /// Baud rate outside the supported range.
    BaudOutOfRange(u32),
    /// Data bits outside 5-8.
    DataBitsUnsupported(u32),
    /// Stop bits outside 1-2.
    StopBitsUnsupported(u32),
    /// No I/O base from defaults, descriptor or discovery.
    MissingIoBase,
    /// Register access width other than 1 or 4 bytes.
    UnsupportedRegWidth(u32),
    /// Register stride too large.
    UnsupportedRegShift(u32),
    /// More than six fields.
    TrailingInput,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadBaud => f.write_str("Bad baud rate"),
            Self::BadClock => f.write_str("Bad clock frequency"),
            Self::BadDataBits => f.write_str("Bad data bits"),
            Self::BadParity(c) => write!(f, "Bad parity '{c}'"),
            Self::BadStopBits => f.write_str("Bad stop bits"),
            Self::BadIoBase => f.write_str("Bad I/O base address"),
            Self::BadIrq => f.write_str("Bad IRQ"),
            Self::BadPortBdf => f.write_str("Bad port PCI coordinates"),
            Self::BadBridgeBdf => f.write_str("Bad bridge PCI coordinates"),
            Self::BaudOutOfRange(baud) => {
                write!(f, "Baud rate {baud} outside supported range.")
            }
            Self::DataBitsUnsupported(bits) => write!(f, "{bits} data bits are unsupported."),
            Self::StopBitsUnsupported(bits) => write!(f, "{bits} stop bits are unsupported."),
            Self::MissingIoBase => f.write_str("I/O base address must be specified."),
            Self::UnsupportedRegWidth(width) => write!(f, "Unsupported reg-io-width {width}"),
            Self::UnsupportedRegShift(shift) => write!(f, "Unsupported reg-shift {shift}"),
            Self::TrailingInput => f.write_str("Trailing input after bridge coordinates"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Platform-supplied defaults for one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartDefaults {
    /// Default baud rate; `None` when the platform has no opinion.
    pub baud: Option<u32>,
    /// Data bits.
    pub data_bits: u8,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: u8,
    /// Interrupt mode.
    pub irq: IrqMode,
    /// I/O base; 0 when unknown.
    pub io_base: u64,
    /// The console line names this port. Without a default baud this
    /// selects auto baud, so the port comes up at whatever rate firmware
    /// left it.
    pub console_selected: bool,
}

impl UartDefaults {
    /// PC COM1: port 0x3F8, IRQ 4, 8N1.
    #[must_use]
    pub const fn com1() -> Self {
        Self {
            baud: None,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            irq: IrqMode::Line(4),
            io_base: 0x3F8,
            console_selected: false,
        }
    }

    /// PC COM2: port 0x2F8, IRQ 3, 8N1.
    #[must_use]
    pub const fn com2() -> Self {
        Self {
            irq: IrqMode::Line(3),
            io_base: 0x2F8,
            ..Self::com1()
        }
    }

    /// PC defaults for `index`.
    #[must_use]
    pub const fn pc(index: PortIndex) -> Self {
        match index {
            PortIndex::Com1 => Self::com1(),
            PortIndex::Com2 => Self::com2(),
        }
    }

    /// Same defaults with console selection set.
    #[must_use]
    pub const fn with_console(mut self, selected: bool) -> Self {
        self.console_selected = selected;
        self
    }
}

/// Source of the I/O base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoBaseSpec {
    /// Literal port number or physical address.
    Address(u64),
    /// `pci`: scan from bus 1, fail if nothing is found.
    Pci,
    /// `amt`: scan from bus 0, fall back to the legacy port.
    Amt,
}

/// The `DPS` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Data bits as written; range-checked during validation.
    pub data_bits: u32,
    /// Parity.
    pub parity: Parity,
    /// Stop bits as written; range-checked during validation.
    pub stop_bits: u32,
}

/// A parsed descriptor. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Baud rate.
    pub baud: Option<Baud>,
    /// UART input clock.
    pub clock_hz: Option<u32>,
    /// Frame format.
    pub format: Option<FrameFormat>,
    /// I/O base or discovery request.
    pub io_base: Option<IoBaseSpec>,
    /// Interrupt mode.
    pub irq: Option<IrqMode>,
    /// Coordinates of the serial function.
    pub port_bdf: Option<PciAddress>,
    /// Coordinates of the upstream bridge.
    pub bridge_bdf: Option<PciAddress>,
}

impl PortDescriptor {
    /// Parses a descriptor string.
    ///
    /// # Errors
    ///
    /// Returns the first malformed field.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut desc = Self::default();
        let mut fields = text.split(',');

        if let Some(field) = fields.next() {
            desc.parse_rate(field)?;
        }
        if let Some(field) = next_field(&mut fields) {
            desc.format = Some(parse_format(field)?);
        }
        if let Some(field) = next_field(&mut fields) {
            desc.io_base = Some(match field {
                "pci" => IoBaseSpec::Pci,
                "amt" => IoBaseSpec::Amt,
                _ => IoBaseSpec::Address(parse_c_uint(field).ok_or(ConfigError::BadIoBase)?),
            });
        }
        if let Some(field) = next_field(&mut fields) {
            let raw: i64 = field.parse().map_err(|_| ConfigError::BadIrq)?;
            desc.irq = Some(IrqMode::from_raw(raw).ok_or(ConfigError::BadIrq)?);
        }
        if let Some(field) = next_field(&mut fields) {
            desc.port_bdf = Some(parse_bdf(field).ok_or(ConfigError::BadPortBdf)?);
        }
        if let Some(field) = next_field(&mut fields) {
            desc.bridge_bdf = Some(parse_bdf(field).ok_or(ConfigError::BadBridgeBdf)?);
        }
        if fields.next().is_some() {
            return Err(ConfigError::TrailingInput);
        }
        Ok(desc)
    }

    /// `true` when no field was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn parse_rate(&mut self, field: &str) -> Result<(), ConfigError> {
        let (baud, clock) = match field.split_once('/') {
            Some((baud, clock)) => (baud, Some(clock)),
            None => (field, None),
        };

        match baud {
            "" => {}
            "auto" => self.baud = Some(Baud::Auto),
            _ => {
                if !baud.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ConfigError::BadBaud);
                }
                let rate: u32 = baud.parse().map_err(|_| ConfigError::BadBaud)?;
                // Zero means "keep the default".
                if rate != 0 {
                    self.baud = Some(Baud::Rate(rate));
                }
            }
        }

        if let Some(clock) = clock {
            let hz = parse_c_uint(clock)
                .and_then(|hz| u32::try_from(hz).ok())
                .filter(|&hz| hz != 0)
                .ok_or(ConfigError::BadClock)?;
            self.clock_hz = Some(hz);
        }
        Ok(())
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(baud) = self.baud {
            write!(f, "{baud}")?;
        }
        if let Some(clock) = self.clock_hz {
            write!(f, "/{clock}")?;
        }
        f.write_str(",")?;
        if let Some(format) = self.format {
            write!(
                f,
                "{}{}{}",
                format.data_bits,
                format.parity.as_char(),
                format.stop_bits
            )?;
        }
        f.write_str(",")?;
        match self.io_base {
            Some(IoBaseSpec::Address(base)) => write!(f, "{base:#x}")?,
            Some(IoBaseSpec::Pci) => f.write_str("pci")?,
            Some(IoBaseSpec::Amt) => f.write_str("amt")?,
            None => {}
        }
        f.write_str(",")?;
        if let Some(irq) = self.irq {
            write!(f, "{}", irq.raw())?;
        }
        f.write_str(",")?;
        if let Some(bdf) = self.port_bdf {
            write!(f, "{bdf}")?;
        }
        f.write_str(",")?;
        if let Some(bdf) = self.bridge_bdf {
            write!(f, "{bdf}")?;
        }
        Ok(())
    }
}

fn next_field<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<&'a str> {
    fields.next().filter(|field| !field.is_empty())
}

fn parse_format(field: &str) -> Result<FrameFormat, ConfigError> {
    let mut chars = field.chars();
    let data_bits = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or(ConfigError::BadDataBits)?;
    let letter = chars.next().ok_or(ConfigError::BadParity(' '))?;
    let parity = Parity::from_char(letter).ok_or(ConfigError::BadParity(letter))?;
    let stop_bits = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or(ConfigError::BadStopBits)?;
    if chars.next().is_some() {
        return Err(ConfigError::BadStopBits);
    }
    Ok(FrameFormat {
        data_bits,
        parity,
        stop_bits,
    })
}

/// Unsigned integer with C prefix rules: `0x` hex, leading `0` octal,
/// otherwise decimal.
fn parse_c_uint(text: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// `[seg:]bus:dev.func`, all hex. Only segment 0 is reachable.
fn parse_bdf(text: &str) -> Option<PciAddress> {
    let mut parts = text.rsplitn(3, ':');
    let dev_func = parts.next()?;
    let bus = parts.next()?;
    if let Some(segment) = parts.next() {
        if u16::from_str_radix(segment, 16).ok()? != 0 {
            return None;
        }
    }
    let (device, function) = dev_func.split_once('.')?;
    PciAddress::new(
        u8::from_str_radix(bus, 16).ok()?,
        u8::from_str_radix(device, 16).ok()?,
        u8::from_str_radix(function, 16).ok()?,
    )
}

/// Settings of a port before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Baud rate; `None` until something supplies one.
    pub baud: Option<Baud>,
    /// UART input clock.
    pub clock_hz: u32,
    /// Data bits.
    pub data_bits: u32,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: u32,
    /// Interrupt mode.
    pub irq: IrqMode,
    /// Register location.
    pub binding: AddressBinding,
    /// PCI attachment.
    pub pci: Option<PciLocation>,
    /// DesignWare busy-detect workaround.
    pub busy_erratum: bool,
}

impl PortSettings {
    /// Settings from platform defaults: standard clock, byte-wide
    /// unshifted registers.
    #[must_use]
    pub fn from_defaults(defaults: &UartDefaults) -> Self {
        let baud = match defaults.baud {
            Some(rate) if rate != 0 => Some(Baud::Rate(rate)),
            _ if defaults.console_selected => Some(Baud::Auto),
            _ => None,
        };
        Self {
            baud,
            clock_hz: UART_CLOCK_HZ,
            data_bits: u32::from(defaults.data_bits),
            parity: defaults.parity,
            stop_bits: u32::from(defaults.stop_bits),
            irq: defaults.irq,
            binding: AddressBinding::legacy(defaults.io_base),
            pci: None,
            busy_erratum: false,
        }
    }

    /// Overlays a descriptor, running PCI discovery if it asks for one.
    ///
    /// # Errors
    ///
    /// [`InitError::PciUnavailable`] when discovery is requested on a
    /// platform without PCI, [`InitError::PciNotFound`] when a `pci` scan
    /// finds nothing.
    pub fn apply(
        &mut self,
        desc: &PortDescriptor,
        index: PortIndex,
        pci: Option<&dyn PciConfigAccess>,
    ) -> Result<(), InitError> {
        if let Some(baud) = desc.baud {
            self.baud = Some(baud);
        }
        if let Some(clock_hz) = desc.clock_hz {
            self.clock_hz = clock_hz;
        }
        if let Some(format) = desc.format {
            self.data_bits = format.data_bits;
            self.parity = format.parity;
            self.stop_bits = format.stop_bits;
        }

        match desc.io_base {
            Some(IoBaseSpec::Address(base)) => self.binding.io_base = base,
            Some(spec @ (IoBaseSpec::Pci | IoBaseSpec::Amt)) => {
                let mode = if spec == IoBaseSpec::Pci {
                    ScanMode::SkipBusZero
                } else {
                    ScanMode::AllBuses
                };
                let pci = pci.ok_or(InitError::PciUnavailable)?;
                #[allow(clippy::cast_possible_truncation)]
                let bar_index = index.index() as u8;
                match serial::discover(pci, mode, bar_index) {
                    Some(Discovery::Card(found)) => {
                        hvcon_core::kinfo!(
                            "ns16550: {index}: PCI serial at {} io {:#x}",
                            found.address,
                            found.io_base
                        );
                        self.binding.io_base = found.io_base;
                        self.irq = IrqMode::from_line(found.irq);
                        self.pci = Some(PciLocation::scanned(&found));
                    }
                    Some(Discovery::LegacyFallback) => {
                        self.binding.io_base = serial::LEGACY_IO_BASE;
                        self.irq = IrqMode::Polled;
                        self.clock_hz = UART_CLOCK_HZ;
                    }
                    None => return Err(InitError::PciNotFound),
                }
            }
            None => {}
        }

        if let Some(irq) = desc.irq {
            self.irq = irq;
        }

        if let Some(function) = desc.port_bdf {
            match &mut self.pci {
                Some(location) => {
                    location.function = function;
                    location.reprogram = true;
                }
                None => self.pci = Some(PciLocation::configured(function)),
            }
        }
        if let Some(bridge) = desc.bridge_bdf {
            match &mut self.pci {
                Some(location) => location.bridge = Some(bridge),
                None => hvcon_core::kwarn!(
                    "ns16550: {index}: bridge {bridge} ignored without port coordinates"
                ),
            }
        }
        Ok(())
    }

    /// Range-checks the settings and produces line parameters.
    ///
    /// # Errors
    ///
    /// The first failing check, in the order baud, data bits, stop bits,
    /// I/O base, register stride.
    pub fn validate(&self) -> Result<LineParams, ConfigError> {
        let baud = self.baud.unwrap_or(Baud::Rate(0));
        if let Baud::Rate(rate) = baud {
            if !(MIN_BAUD..=MAX_BAUD).contains(&rate) {
                return Err(ConfigError::BaudOutOfRange(rate));
            }
        }
        let data_bits = u8::try_from(self.data_bits)
            .ok()
            .filter(|bits| (5..=8).contains(bits))
            .ok_or(ConfigError::DataBitsUnsupported(self.data_bits))?;
        let stop_bits = u8::try_from(self.stop_bits)
            .ok()
            .filter(|bits| (1..=2).contains(bits))
            .ok_or(ConfigError::StopBitsUnsupported(self.stop_bits))?;
        if self.binding.io_base == 0 {
            return Err(ConfigError::MissingIoBase);
        }
        if self.binding.reg_shift > MAX_REG_SHIFT {
            return Err(ConfigError::UnsupportedRegShift(self.binding.reg_shift));
        }
        Ok(LineParams {
            baud,
            clock_hz: self.clock_hz,
            data_bits,
            parity: self.parity,
            stop_bits,
        })
    }
}
