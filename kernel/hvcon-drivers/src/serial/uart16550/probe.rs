//! Existence and capability probing.

use super::access::{AccessMode, RegisterAccess};
use super::regs::{Fcr, Iir, Mcr, Msr, reg};

/// MCR value for the loopback test: loopback with RTS and OUT2 raised.
const LOOPBACK_PATTERN: Mcr = Mcr::LOOPBACK.union(Mcr::RTS).union(Mcr::OUT2);

/// MSR high nibble a real 16550 reflects for [`LOOPBACK_PATTERN`]: RTS loops
/// to CTS, OUT2 loops to DCD.
const LOOPBACK_EXPECTED: Msr = Msr::CTS.union(Msr::DCD);

/// Confirms a 16550-family chip answers at the binding.
///
/// Two stages, both required:
///
/// 1. IER reserved-bit test. Writing 0x00 must read back a zero low nibble
///    and writing 0x0F must read back 0x0F. The high nibble is ignored since
///    some parts (e.g. TL16C754B) gate those bits behind EFR.
/// 2. Loopback test. With MCR in loopback the modem outputs are wired to the
///    modem inputs, so the MSR high nibble must mirror the pattern.
///
/// Memory-mapped ports are not probed: their window may not be mapped yet
/// and platforms that describe MMIO UARTs are trusted to be right.
#[must_use]
pub fn check_existence(regs: &RegisterAccess) -> bool {
    if regs.mode() != AccessMode::PortMapped {
        return true;
    }

    let saved = regs.read(reg::IER);
    regs.write(reg::IER, 0x00);
    let cleared = regs.read(reg::IER) & 0x0F;
    regs.write(reg::IER, 0x0F);
    let set = regs.read(reg::IER) & 0x0F;
    regs.write(reg::IER, saved);
    if cleared != 0x00 || set != 0x0F {
        return false;
    }

    regs.write(reg::MCR, LOOPBACK_PATTERN.bits());
    let status = regs.read(reg::MSR) & 0xF0;
    status == LOOPBACK_EXPECTED.bits()
}

/// Whether the 16-byte FIFOs latched after the FCR write of the
/// pre-interrupt phase. An 8250/16450 reads back neither bit pattern.
#[must_use]
pub fn detect_fifo(regs: &RegisterAccess) -> bool {
    let iir = regs.read(reg::IIR);
    let fcr = regs.read(reg::FCR);
    iir & Iir::FIFOS_ENABLED.bits() == Iir::FIFOS_ENABLED.bits()
        && fcr & Fcr::TRIGGER_14.bits() == Fcr::TRIGGER_14.bits()
}
