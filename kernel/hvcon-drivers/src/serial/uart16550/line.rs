//! Line format and baud-rate programming.

use core::fmt;

use super::access::RegisterAccess;
use super::regs::{Fcr, Iir, Lcr, Mcr, reg};

/// Slowest supported baud rate.
pub const MIN_BAUD: u32 = 1200;
/// Fastest supported baud rate.
pub const MAX_BAUD: u32 = 115_200;

/// Baud rate setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baud {
    /// Keep whatever divisor firmware or a bootloader programmed and read
    /// the rate back from it.
    Auto,
    /// Program this rate.
    Rate(u32),
}

impl fmt::Display for Baud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Rate(rate) => write!(f, "{rate}"),
        }
    }
}

/// Parity mode. Discriminants are LCR bits 3-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Parity {
    /// No parity bit.
    None = 0b000 << 3,
    /// Odd parity.
    Odd = 0b001 << 3,
    /// Even parity.
    Even = 0b011 << 3,
    /// Parity bit always 1.
    Mark = 0b101 << 3,
    /// Parity bit always 0.
    Space = 0b111 << 3,
}

impl Parity {
    /// Parses a descriptor parity letter (`n`, `o`, `e`, `m`, `s`).
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(Self::None),
            'o' => Some(Self::Odd),
            'e' => Some(Self::Even),
            'm' => Some(Self::Mark),
            's' => Some(Self::Space),
            _ => None,
        }
    }

    /// Descriptor letter for this mode.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::None => 'n',
            Self::Odd => 'o',
            Self::Even => 'e',
            Self::Mark => 'm',
            Self::Space => 's',
        }
    }

    /// Whether a parity bit is sent at all.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    /// LCR bits 3-5.
    #[must_use]
    pub const fn lcr_bits(self) -> u8 {
        self as u8
    }
}

/// Validated line settings of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParams {
    /// Baud rate; becomes [`Baud::Rate`] after an auto readback.
    pub baud: Baud,
    /// UART input clock.
    pub clock_hz: u32,
    /// Data bits, 5-8.
    pub data_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits, 1-2.
    pub stop_bits: u8,
}

impl LineParams {
    /// Line control byte for these settings, DLAB clear.
    #[must_use]
    pub const fn lcr(&self) -> Lcr {
        lcr_bits(self.data_bits, self.stop_bits, self.parity)
    }

    /// Bits on the wire per character: data + stop + optional parity.
    #[must_use]
    pub const fn frame_bits(&self) -> u32 {
        self.data_bits as u32 + self.stop_bits as u32 + self.parity.is_enabled() as u32
    }
}

impl fmt::Display for LineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}{}{}",
            self.baud,
            self.clock_hz,
            self.data_bits,
            self.parity.as_char(),
            self.stop_bits
        )
    }
}

/// Packs a line control byte: bits 0-1 `data_bits - 5`, bit 2
/// `stop_bits - 1`, bits 3-5 parity.
#[must_use]
pub const fn lcr_bits(data_bits: u8, stop_bits: u8, parity: Parity) -> Lcr {
    let word = (data_bits.wrapping_sub(5)) & Lcr::WORD_LEN.bits();
    let stop = ((stop_bits.wrapping_sub(1)) << 2) & Lcr::STOP_BIT.bits();
    Lcr::from_bits_truncate(word | stop | parity.lcr_bits())
}

/// Divisor latch value for `baud`: `clock_hz / (baud * 16)`, truncated.
///
/// A quotient wider than the 16-bit latch saturates to `0xFFFF`, so the
/// line then runs faster than requested; [`program`] warns when that
/// happens.
#[must_use]
pub const fn divisor_for(clock_hz: u32, baud: u32) -> u16 {
    let divisor = clock_hz / (baud << 4);
    if divisor > u16::MAX as u32 {
        u16::MAX
    } else {
        divisor as u16
    }
}

/// Baud rate a divisor latch value produces, or `None` for a zero divisor.
#[must_use]
pub const fn baud_for(clock_hz: u32, divisor: u16) -> Option<u32> {
    if divisor == 0 {
        return None;
    }
    Some(clock_hz / ((divisor as u32) << 4))
}

/// Programs line format, baud rate, modem control and FIFOs.
///
/// Leaves interrupts disabled at the UART. With [`Baud::Auto`], the divisor
/// already in the latch is kept and `params.baud` is replaced by the rate it
/// yields.
///
/// `busy_erratum` enables the DesignWare workaround: writing LCR while the
/// UART is busy raises busy-detect and the write is dropped, so the latch is
/// cleared by reading USR first.
pub fn program(regs: &RegisterAccess, params: &mut LineParams, busy_erratum: bool) {
    let lcr = params.lcr();

    regs.write(reg::IER, 0);

    if busy_erratum
        && regs.read(reg::IIR) & Iir::BUSY_DETECT.bits() == Iir::BUSY_DETECT.bits()
    {
        let _ = regs.read(reg::USR);
    }

    regs.write(reg::LCR, (lcr | Lcr::DLAB).bits());
    match params.baud {
        Baud::Rate(rate) => {
            if params.clock_hz / (rate << 4) > u32::from(u16::MAX) {
                hvcon_core::kwarn!(
                    "ns16550: {rate} baud at {} Hz overflows the divisor latch, clamped",
                    params.clock_hz
                );
            }
            let [low, high] = divisor_for(params.clock_hz, rate).to_le_bytes();
            regs.write(reg::DLL, low);
            regs.write(reg::DLM, high);
        }
        Baud::Auto => {
            let divisor = u16::from_le_bytes([regs.read(reg::DLL), regs.read(reg::DLM)]);
            match baud_for(params.clock_hz, divisor) {
                Some(rate) => params.baud = Baud::Rate(rate),
                None => hvcon_core::kwarn!("ns16550: divisor latch is zero, baud unknown"),
            }
        }
    }
    regs.write(reg::LCR, lcr.bits());

    // No flow control: DTR and RTS stay asserted.
    regs.write(reg::MCR, (Mcr::DTR | Mcr::RTS).bits());

    regs.write(
        reg::FCR,
        (Fcr::ENABLE | Fcr::CLEAR_RX | Fcr::CLEAR_TX | Fcr::TRIGGER_14).bits(),
    );
}
