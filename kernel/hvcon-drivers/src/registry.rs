//! Console port registry.
//!
//! Owns the registered UARTs by slot and fans the console subsystem's
//! lifecycle calls out to them. The platform's interrupt and timer glue
//! routes callbacks here by slot.

use alloc::boxed::Box;

use hvcon_driver_api::{ConsoleUart, DriverError, PortIndex, SerialLine, UartRegistrar};

/// Two-slot registry of console UARTs.
pub struct ConsoleRegistry {
    slots: [Option<Box<dyn ConsoleUart>>; 2],
}

impl Default for ConsoleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None, None],
        }
    }

    /// The UART in `index`, if registered.
    #[must_use]
    pub fn get(&self, index: PortIndex) -> Option<&(dyn ConsoleUart + 'static)> {
        self.slots[index.index()].as_deref()
    }

    /// Mutable access to the UART in `index`.
    pub fn get_mut(&mut self, index: PortIndex) -> Option<&mut (dyn ConsoleUart + 'static)> {
        self.slots[index.index()].as_deref_mut()
    }

    /// Runs `f` on every registered UART in slot order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(PortIndex, &mut dyn ConsoleUart)) {
        for index in PortIndex::ALL {
            if let Some(uart) = self.slots[index.index()].as_deref_mut() {
                f(index, uart);
            }
        }
    }

    /// Pre-interrupt configuration of every port.
    pub fn init_pre_interrupt(&mut self) {
        self.for_each_mut(|_, uart| uart.init_pre_interrupt());
    }

    /// Post-interrupt configuration of every port.
    pub fn init_post_interrupt(&mut self) {
        self.for_each_mut(|_, uart| uart.init_post_interrupt());
    }

    /// End-of-boot hook of every port.
    pub fn end_of_boot(&mut self) {
        self.for_each_mut(|_, uart| uart.end_of_boot());
    }

    /// Suspends every port.
    pub fn suspend(&mut self) {
        self.for_each_mut(|_, uart| uart.suspend());
    }

    /// Resumes every port.
    pub fn resume(&mut self) {
        self.for_each_mut(|_, uart| uart.resume());
    }

    /// Delivers an interrupt on `irq` to every port assigned that line.
    /// Returns whether any port claimed it.
    pub fn dispatch_irq(&self, irq: u32, line: &dyn SerialLine) -> bool {
        let mut claimed = false;
        for uart in self.slots.iter().flatten() {
            if uart.assigned_irq() == Some(irq) {
                uart.handle_interrupt(line);
                claimed = true;
            }
        }
        claimed
    }
}

impl UartRegistrar for ConsoleRegistry {
    fn register_uart(
        &mut self,
        index: PortIndex,
        uart: Box<dyn ConsoleUart>,
    ) -> Result<(), DriverError> {
        let slot = &mut self.slots[index.index()];
        if slot.is_some() {
            return Err(DriverError::ResourceBusy);
        }
        *slot = Some(uart);
        Ok(())
    }
}
