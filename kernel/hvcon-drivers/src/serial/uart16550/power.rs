//! Suspend and resume.
//!
//! After a sleep transition the UART may answer with all-ones until
//! firmware, or a control-domain driver for the LPC bridge behind it,
//! brings it back. Resume then waits on a one-shot timer instead of
//! spinning, and gives up waiting after [`RESUME_RETRIES`] attempts.

use core::time::Duration;

use hvcon_driver_api::pci::regs;

use super::Ns16550;

/// Delayed resume attempts before resuming regardless.
pub const RESUME_RETRIES: u32 = 100;

/// Delay between resume attempts.
pub const RESUME_DELAY: Duration = Duration::from_millis(10);

impl Ns16550 {
    /// Stops polling and captures PCI state the platform may clear.
    pub fn suspend(&mut self) {
        if let Some(timer) = &self.poll_timer {
            timer.cancel();
        }

        let Some(pci) = self.platform.pci_config() else {
            return;
        };
        if let Some(location) = self.pci.as_mut().filter(|l| l.bar.is_some()) {
            location.saved_command = pci.read_u16(location.function, regs::COMMAND);
        }
    }

    /// Resumes now if the device answers, otherwise starts the delayed
    /// retry sequence.
    pub fn resume(&mut self) {
        if !self.regs.is_unavailable() {
            self.reinit();
            return;
        }

        match &self.resume_timer {
            Some(timer) => {
                self.resume_tries = RESUME_RETRIES;
                hvcon_core::kdebug!("ns16550: {}: not answering, delaying resume", self.index);
                timer.arm(RESUME_DELAY);
            }
            None => {
                hvcon_core::kwarn!(
                    "ns16550: {}: not answering and no retry timer, resuming anyway",
                    self.index
                );
                self.reinit();
            }
        }
    }

    /// Resume-retry timer callback.
    ///
    /// Each attempt that still sees the device unavailable spends one unit
    /// of budget. The first attempt that finds the budget empty resumes
    /// anyway.
    pub fn resume_tick(&mut self) {
        if self.regs.is_unavailable() {
            if self.resume_tries > 0 {
                self.resume_tries -= 1;
                hvcon_core::kdebug!(
                    "ns16550: {}: resume retry, {} left",
                    self.index,
                    self.resume_tries
                );
                if let Some(timer) = &self.resume_timer {
                    timer.arm(RESUME_DELAY);
                }
                return;
            }
            hvcon_core::kwarn!("ns16550: {}: still not answering, forcing resume", self.index);
        }
        self.reinit();
    }

    /// Restores the card's PCI state and reruns both configuration phases.
    /// The card is not rescanned.
    fn reinit(&mut self) {
        self.resume_tries = 0;
        if let (Some(location), Some(pci)) = (&self.pci, self.platform.pci_config()) {
            if let Some(bar) = location.bar {
                pci.write_u32(location.function, regs::bar(bar.index), bar.value);
                pci.write_u16(location.function, regs::COMMAND, location.saved_command);
            }
        }
        self.setup_pre_interrupt();
        self.setup_post_interrupt();
    }
}
