//! Interrupt-driven I/O with a polling fallback.
//!
//! A port with an interrupt line starts out polling anyway: the line may be
//! misrouted or shared with a device that never acknowledges. The first
//! real interrupt sets `intr_works`, after which the poll timer stops
//! re-arming. Only a reconfiguration pass clears the latch again.

use core::sync::atomic::Ordering;
use core::time::Duration;

use hvcon_driver_api::{DriverError, SerialLine, TimerKind};

use super::Ns16550;
use super::line::{Baud, MAX_BAUD};
use super::regs::{Ier, Iir, Lsr, Mcr, reg};

/// Interrupt configuration of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqMode {
    /// Port is configured but never polled or interrupted.
    Disabled,
    /// Timer-driven polling only.
    Polled,
    /// Interrupt line, with polling until the line is seen to work.
    Line(u32),
}

impl IrqMode {
    /// Maps a signed IRQ number: negative disables, zero polls.
    #[must_use]
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            i64::MIN..=-1 => Some(Self::Disabled),
            0 => Some(Self::Polled),
            line => u32::try_from(line).ok().map(Self::Line),
        }
    }

    /// Maps an interrupt line read from hardware, where 0 means none.
    #[must_use]
    pub const fn from_line(line: u32) -> Self {
        if line == 0 { Self::Polled } else { Self::Line(line) }
    }

    /// Signed IRQ number: -1, 0 or the line.
    #[must_use]
    pub fn raw(self) -> i64 {
        match self {
            Self::Disabled => -1,
            Self::Polled => 0,
            Self::Line(line) => i64::from(line),
        }
    }
}

/// Where the I/O engine of a port stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Pre-interrupt configuration has not run.
    Uninitialized,
    /// Configured with interrupts and polling both off.
    Disabled,
    /// Configured, timer-driven.
    Polled,
    /// Interrupt line registered but no interrupt seen since the last
    /// configuration pass; polling continues.
    InterruptUnconfirmed,
    /// An interrupt arrived; polling has stopped.
    InterruptConfirmed,
}

/// Poll period: the time to move one FIFO's worth of frames at `baud`,
/// never less than a millisecond. Saturates at `u32::MAX`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn poll_interval_ms(frame_bits: u32, fifo_size: u32, baud: u32) -> u32 {
    let baud = if baud == 0 { 1 } else { baud as u64 };
    let ms = frame_bits as u64 * fifo_size as u64 * 1000 / baud;
    if ms == 0 {
        1
    } else if ms > u32::MAX as u64 {
        u32::MAX
    } else {
        ms as u32
    }
}

impl Ns16550 {
    /// Current engine state.
    #[must_use]
    pub fn engine_state(&self) -> EngineState {
        if !self.configured {
            return EngineState::Uninitialized;
        }
        match self.irq {
            IrqMode::Disabled => EngineState::Disabled,
            IrqMode::Polled => EngineState::Polled,
            IrqMode::Line(_) if self.intr_works.load(Ordering::Acquire) => {
                EngineState::InterruptConfirmed
            }
            IrqMode::Line(_) => EngineState::InterruptUnconfirmed,
        }
    }

    /// Computed poll period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Creates timers, claims the interrupt line and arms the engine.
    pub(super) fn start_engine(&mut self) {
        if self.irq == IrqMode::Disabled {
            return;
        }

        let slot = self.index.index();
        if self.poll_timer.is_none() {
            self.poll_timer = Some(self.platform.create_timer(slot, TimerKind::Poll));
        }
        if self.resume_timer.is_none() {
            self.resume_timer = Some(self.platform.create_timer(slot, TimerKind::ResumeRetry));
        }

        // An undetermined auto baud is treated as the fastest rate.
        let baud = match self.params.baud {
            Baud::Rate(rate) if rate != 0 => rate,
            _ => MAX_BAUD,
        };
        self.timeout_ms = poll_interval_ms(self.params.frame_bits(), self.fifo_size, baud);

        if let IrqMode::Line(line) = self.irq {
            if let Err(err) = self.platform.register_irq(line, slot, "ns16550") {
                hvcon_core::kerr!("ns16550: {}: failed to claim IRQ {line}: {err}", self.index);
            }
        }

        self.setup_post_interrupt();

        if let Some(location) = &self.pci {
            self.platform.hide_pci_device(location.function);
        }
    }

    /// Enables UART interrupts for line-driven ports and arms the poll timer.
    pub(super) fn setup_post_interrupt(&self) {
        if let IrqMode::Line(_) = self.irq {
            // OUT2 gates the interrupt output on PC-style boards.
            self.regs
                .write(reg::MCR, (Mcr::OUT2 | Mcr::DTR | Mcr::RTS).bits());
            self.regs
                .write(reg::IER, (Ier::RX_DATA | Ier::THR_EMPTY).bits());
        }
        if self.irq != IrqMode::Disabled {
            self.arm_poll_timer();
        }
    }

    fn arm_poll_timer(&self) {
        if let Some(timer) = &self.poll_timer {
            timer.arm(self.poll_interval());
        }
    }

    /// Services every pending interrupt cause.
    ///
    /// Loops until IIR reports nothing pending, so causes coalesced on a
    /// shared or level-triggered line are not lost.
    pub fn handle_interrupt(&self, line: &dyn SerialLine) {
        self.intr_works.store(true, Ordering::Release);

        while self.regs.read(reg::IIR) & Iir::NO_INT.bits() == 0 {
            let lsr = Lsr::from_bits_retain(self.regs.read(reg::LSR));
            if lsr.contains(Lsr::THR_EMPTY) {
                line.signal_transmit_ready(self);
            }
            if lsr.contains(Lsr::DATA_READY) {
                line.signal_receive_data(self);
            }
        }
    }

    /// Poll timer callback.
    ///
    /// Does nothing, and does not re-arm, once interrupts are confirmed.
    pub fn poll_tick(&self, line: &dyn SerialLine) {
        if self.intr_works.load(Ordering::Acquire) {
            return;
        }

        let mut present = true;
        while self.regs.read(reg::LSR) & Lsr::DATA_READY.bits() != 0 {
            if self.regs.is_unavailable() {
                present = false;
                break;
            }
            line.signal_receive_data(self);
        }

        if present && self.regs.read(reg::LSR) & Lsr::THR_EMPTY.bits() != 0 {
            line.signal_transmit_ready(self);
        }

        self.arm_poll_timer();
    }

    /// Free transmit slots: the FIFO depth when THR is empty, else 0.
    ///
    /// # Errors
    ///
    /// [`DriverError::Unavailable`] when the device reads as withdrawn.
    pub fn transmit_ready(&self) -> Result<u32, DriverError> {
        if self.regs.is_unavailable() {
            return Err(DriverError::Unavailable);
        }
        if self.regs.read(reg::LSR) & Lsr::THR_EMPTY.bits() != 0 {
            Ok(self.fifo_size)
        } else {
            Ok(0)
        }
    }

    /// Writes one byte to THR. The caller has checked [`Self::transmit_ready`].
    pub fn put_byte(&self, byte: u8) {
        self.regs.write(reg::THR, byte);
    }

    /// Reads one byte if the device is present and has data.
    #[must_use]
    pub fn get_byte(&self) -> Option<u8> {
        if self.regs.is_unavailable()
            || self.regs.read(reg::LSR) & Lsr::DATA_READY.bits() == 0
        {
            return None;
        }
        Some(self.regs.read(reg::RBR))
    }
}
