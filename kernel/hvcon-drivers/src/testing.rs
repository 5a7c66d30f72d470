//! Host-side simulators for driver tests.
//!
//! `SimUart` models a 16550 register file closely enough for the probe,
//! line programming and I/O engine to run against it; `SimPciBus` models
//! configuration space with BAR sizing; `SimPlatform` ties them to the
//! platform capability traits and records what the driver asked for.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hvcon_core::LogLevel;
use hvcon_driver_api::pci::regs;
use hvcon_driver_api::{
    DeferredTimer, DriverError, MmioWindow, PciAddress, PciConfigAccess, PlatformServices,
    PortIndex, PortIo, SerialLine, TimerKind, UartIo,
};

use crate::serial::uart16550::config::UartDefaults;
use crate::serial::uart16550::regs::reg;
use crate::serial::uart16550::{Ns16550, resolve_port};

// ── UART ────────────────────────────────────────────────────────────────

/// Ways a simulated chip deviates from a clean 16550.
#[derive(Debug, Clone, Copy, Default)]
pub struct UartQuirks {
    /// IER bits 4-7 read back as ones.
    pub ier_high_nibble_stuck: bool,
    /// These IER bits always read back set.
    pub ier_stuck_bits: u8,
    /// IER ignores writes and reads zero.
    pub ier_read_only_zero: bool,
    /// MSR does not reflect MCR in loopback mode.
    pub no_loopback: bool,
    /// FCR writes are ignored (8250/16450).
    pub no_fifo: bool,
    /// DesignWare busy-detect: LCR writes dropped while busy.
    pub designware_busy: bool,
}

#[derive(Debug, Default)]
struct UartState {
    present: bool,
    ier: u8,
    lcr: u8,
    mcr: u8,
    scr: u8,
    dll: u8,
    dlm: u8,
    fifo: bool,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    thre_pending: bool,
    hold_tx: bool,
    busy: bool,
    fail_ier_reads: usize,
    ier_reads: usize,
    usr_reads: usize,
    lcr_writes: usize,
    dword_accesses: usize,
    log: Vec<(u64, bool)>,
}

/// Simulated 16550 register file.
#[derive(Debug)]
pub struct SimUart {
    quirks: UartQuirks,
    shift: u32,
    state: Mutex<UartState>,
}

impl SimUart {
    /// A present, clean 16550 with divisor 1 latched.
    pub fn new() -> Self {
        Self::with_quirks(UartQuirks::default())
    }

    /// A clean 16550 whose memory window uses `shift`.
    pub fn with_shift(shift: u32) -> Self {
        Self {
            shift,
            ..Self::new()
        }
    }

    /// A chip with `quirks`.
    pub fn with_quirks(quirks: UartQuirks) -> Self {
        Self {
            quirks,
            shift: 0,
            state: Mutex::new(UartState {
                present: true,
                dll: 1,
                ..UartState::default()
            }),
        }
    }

    /// Replaces the quirks.
    pub fn quirks(mut self, quirks: UartQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    fn state(&self) -> MutexGuard<'_, UartState> {
        self.state.lock().unwrap()
    }

    fn dlab(state: &UartState) -> bool {
        state.lcr & 0x80 != 0
    }

    fn read_reg(&self, index: u64) -> u8 {
        let q = self.quirks;
        let mut s = self.state();
        if index == u64::from(reg::IER) && !Self::dlab(&s) {
            s.ier_reads += 1;
            if s.fail_ier_reads > 0 {
                s.fail_ier_reads -= 1;
                return 0xFF;
            }
        }
        if !s.present {
            return 0xFF;
        }
        let fifo_bits = if s.fifo { 0xC0 } else { 0x00 };
        match index {
            0 if Self::dlab(&s) => s.dll,
            0 => s.rx.pop_front().unwrap_or(0),
            1 if Self::dlab(&s) => s.dlm,
            1 => {
                if q.ier_read_only_zero {
                    0
                } else {
                    let high = if q.ier_high_nibble_stuck { 0xF0 } else { 0 };
                    s.ier | q.ier_stuck_bits | high
                }
            }
            2 => {
                let id = if q.designware_busy && s.busy {
                    0x07
                } else if !s.rx.is_empty() && s.ier & 0x01 != 0 {
                    0x04
                } else if s.thre_pending && s.ier & 0x02 != 0 {
                    s.thre_pending = false;
                    0x02
                } else {
                    0x01
                };
                id | fifo_bits
            }
            3 => s.lcr,
            4 => s.mcr,
            5 => {
                let mut lsr = 0;
                if !s.rx.is_empty() {
                    lsr |= 0x01;
                }
                if !s.hold_tx {
                    lsr |= 0x60;
                }
                lsr
            }
            6 => {
                if s.mcr & 0x10 == 0 || q.no_loopback {
                    0
                } else {
                    let m = s.mcr;
                    ((m & 0x02) << 3) | ((m & 0x01) << 5) | ((m & 0x04) << 4) | ((m & 0x08) << 4)
                }
            }
            7 => s.scr,
            0x1F => {
                s.usr_reads += 1;
                s.busy = false;
                0
            }
            _ => 0xFF,
        }
    }

    fn write_reg(&self, index: u64, value: u8) {
        let q = self.quirks;
        let mut s = self.state();
        if index == u64::from(reg::LCR) {
            s.lcr_writes += 1;
        }
        if !s.present {
            return;
        }
        match index {
            0 if Self::dlab(&s) => s.dll = value,
            0 => {
                s.tx.push(value);
                s.thre_pending = !s.hold_tx;
            }
            1 if Self::dlab(&s) => s.dlm = value,
            1 => {
                if !q.ier_read_only_zero {
                    s.ier = value & 0x0F;
                    if s.ier & 0x02 != 0 && !s.hold_tx {
                        s.thre_pending = true;
                    }
                }
            }
            2 => {
                if !q.no_fifo {
                    s.fifo = value & 0x01 != 0;
                    if value & 0x02 != 0 {
                        s.rx.clear();
                    }
                }
            }
            3 => {
                if !(q.designware_busy && s.busy) {
                    s.lcr = value;
                }
            }
            4 => s.mcr = value & 0x1F,
            7 => s.scr = value,
            _ => {}
        }
    }

    /// Every bus access so far: (port or window offset, is_write).
    pub fn access_log(&self) -> Vec<(u64, bool)> {
        self.state().log.clone()
    }

    /// Number of 32-bit window accesses.
    pub fn dword_accesses(&self) -> usize {
        self.state().dword_accesses
    }

    /// Plugs or unplugs the chip. An absent chip reads all-ones.
    pub fn set_present(&self, present: bool) {
        self.state().present = present;
    }

    /// The next `count` IER reads return the sentinel.
    pub fn fail_next_ier_reads(&self, count: usize) {
        self.state().fail_ier_reads = count;
    }

    /// IER reads so far.
    pub fn ier_reads(&self) -> usize {
        self.state().ier_reads
    }

    /// Sets IER without a bus access.
    pub fn poke_ier(&self, value: u8) {
        self.state().ier = value & 0x0F;
    }

    /// Stored IER.
    pub fn peek_ier(&self) -> u8 {
        self.state().ier
    }

    /// Sets LCR without a bus access.
    pub fn poke_lcr(&self, value: u8) {
        self.state().lcr = value;
    }

    /// Stored LCR.
    pub fn peek_lcr(&self) -> u8 {
        self.state().lcr
    }

    /// LCR writes attempted, including dropped ones.
    pub fn lcr_writes(&self) -> usize {
        self.state().lcr_writes
    }

    /// Stored MCR.
    pub fn peek_mcr(&self) -> u8 {
        self.state().mcr
    }

    /// Latched divisor.
    pub fn divisor(&self) -> u16 {
        let s = self.state();
        u16::from_le_bytes([s.dll, s.dlm])
    }

    /// Latches `divisor` as firmware would.
    pub fn set_divisor(&self, divisor: u16) {
        let [low, high] = divisor.to_le_bytes();
        let mut s = self.state();
        s.dll = low;
        s.dlm = high;
    }

    /// Whether the FIFOs are enabled.
    pub fn fifo_enabled(&self) -> bool {
        self.state().fifo
    }

    /// Enters the busy-detect condition.
    pub fn raise_busy(&self) {
        self.state().busy = true;
    }

    /// USR reads so far.
    pub fn usr_reads(&self) -> usize {
        self.state().usr_reads
    }

    /// Queues received bytes.
    pub fn push_rx(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes.iter().copied());
    }

    /// Keeps THR full while `hold` is set.
    pub fn hold_transmitter(&self, hold: bool) {
        self.state().hold_tx = hold;
    }

    /// Bytes written to THR.
    pub fn transmitted(&self) -> Vec<u8> {
        self.state().tx.clone()
    }
}

impl PortIo for SimUart {
    fn read_u8(&self, port: u16) -> u8 {
        self.state().log.push((u64::from(port), false));
        self.read_reg(u64::from(port & 7))
    }

    fn write_u8(&self, port: u16, value: u8) {
        self.state().log.push((u64::from(port), true));
        self.write_reg(u64::from(port & 7), value);
    }
}

/// Memory window onto a `SimUart`.
struct SimWindow {
    uart: &'static SimUart,
    size: u64,
}

impl SimWindow {
    fn index(&self, offset: u64, write: bool, dword: bool) -> u64 {
        let mut s = self.uart.state();
        s.log.push((offset, write));
        if dword {
            s.dword_accesses += 1;
        }
        offset >> self.uart.shift
    }
}

impl MmioWindow for SimWindow {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_u8(&self, offset: u64) -> u8 {
        let index = self.index(offset, false, false);
        self.uart.read_reg(index)
    }

    fn read_u32(&self, offset: u64) -> u32 {
        let index = self.index(offset, false, true);
        u32::from(self.uart.read_reg(index)) | 0xFFFF_FF00
    }

    fn write_u8(&self, offset: u64, value: u8) {
        let index = self.index(offset, true, false);
        self.uart.write_reg(index, value);
    }

    fn write_u32(&self, offset: u64, value: u32) {
        let index = self.index(offset, true, true);
        self.uart.write_reg(index, value.to_le_bytes()[0]);
    }
}

// ── PCI ─────────────────────────────────────────────────────────────────

/// One function's configuration space.
#[derive(Debug, Clone)]
pub struct SimFunction {
    config: [u8; 256],
    /// Per-BAR (size, is_io); size 0 means unimplemented.
    bars: [(u32, bool); 6],
}

impl SimFunction {
    /// A function with only a class word.
    pub fn other(class: u16) -> Self {
        let mut config = [0u8; 256];
        config[0..2].copy_from_slice(&0x8086u16.to_le_bytes());
        config[0x0A..0x0C].copy_from_slice(&class.to_le_bytes());
        Self {
            config,
            bars: [(0, false); 6],
        }
    }

    /// A serial-class function with an I/O BAR0.
    pub fn serial(class: u16, io_base: u32, size: u32) -> Self {
        Self::other(class).with_bar(0, io_base, size)
    }

    /// A serial-class function with a memory BAR0.
    pub fn serial_mmio(class: u16, base: u32, size: u32) -> Self {
        let mut function = Self::other(class);
        function.bars[0] = (size, false);
        function.store_bar(0, base);
        function
    }

    /// Adds an I/O BAR.
    pub fn with_bar(mut self, index: usize, io_base: u32, size: u32) -> Self {
        self.bars[index] = (size, true);
        self.store_bar(index, io_base);
        self
    }

    /// Sets interrupt pin and line.
    pub fn with_irq(mut self, pin: u8, line: u8) -> Self {
        self.config[usize::from(regs::INTERRUPT_PIN)] = pin;
        self.config[usize::from(regs::INTERRUPT_LINE)] = line;
        self
    }

    /// Marks the header multi-function.
    pub fn multi_function(mut self) -> Self {
        self.config[usize::from(regs::HEADER_TYPE)] |= regs::HEADER_MULTI_FUNCTION;
        self
    }

    fn store_bar(&mut self, index: usize, value: u32) {
        let (size, io) = self.bars[index];
        let stored = if size == 0 {
            0
        } else {
            (value & !(size - 1)) | u32::from(io)
        };
        let at = usize::from(regs::BAR0) + index * 4;
        self.config[at..at + 4].copy_from_slice(&stored.to_le_bytes());
    }

    fn read(&self, offset: u8, width: usize) -> u32 {
        let at = usize::from(offset);
        let mut bytes = [0u8; 4];
        bytes[..width].copy_from_slice(&self.config[at..at + width]);
        u32::from_le_bytes(bytes)
    }

    fn write(&mut self, offset: u8, width: usize, value: u32) {
        let at = usize::from(offset);
        if width == 4 && (0x10..0x28).contains(&at) {
            self.store_bar((at - 0x10) / 4, value);
            return;
        }
        self.config[at..at + width].copy_from_slice(&value.to_le_bytes()[..width]);
    }
}

/// Simulated configuration space.
#[derive(Debug, Default)]
pub struct SimPciBus {
    functions: Mutex<BTreeMap<PciAddress, SimFunction>>,
}

impl SimPciBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a function.
    pub fn add(&self, addr: PciAddress, function: SimFunction) {
        self.functions.lock().unwrap().insert(addr, function);
    }

    fn read(&self, addr: PciAddress, offset: u8, width: usize) -> u32 {
        self.functions
            .lock()
            .unwrap()
            .get(&addr)
            .map_or(u32::MAX, |f| f.read(offset, width))
    }

    fn write(&self, addr: PciAddress, offset: u8, width: usize, value: u32) {
        if let Some(f) = self.functions.lock().unwrap().get_mut(&addr) {
            f.write(offset, width, value);
        }
    }
}

impl PciConfigAccess for SimPciBus {
    fn read_u8(&self, addr: PciAddress, offset: u8) -> u8 {
        self.read(addr, offset, 1).to_le_bytes()[0]
    }

    fn read_u16(&self, addr: PciAddress, offset: u8) -> u16 {
        let [low, high, ..] = self.read(addr, offset, 2).to_le_bytes();
        u16::from_le_bytes([low, high])
    }

    fn read_u32(&self, addr: PciAddress, offset: u8) -> u32 {
        self.read(addr, offset, 4)
    }

    fn write_u16(&self, addr: PciAddress, offset: u8, value: u16) {
        self.write(addr, offset, 2, u32::from(value));
    }

    fn write_u32(&self, addr: PciAddress, offset: u8, value: u32) {
        self.write(addr, offset, 4, value);
    }
}

// ── Timers ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TimerState {
    armed: Option<Duration>,
    arm_count: usize,
    last_delay: Option<Duration>,
}

/// Test-side view of a timer the driver created.
#[derive(Debug, Clone, Default)]
pub struct SimTimer(Arc<Mutex<TimerState>>);

impl SimTimer {
    /// Pending delay, if armed.
    pub fn armed(&self) -> Option<Duration> {
        self.0.lock().unwrap().armed
    }

    /// Expires the timer; returns the delay it was armed with.
    pub fn fire(&self) -> Option<Duration> {
        self.0.lock().unwrap().armed.take()
    }

    /// Times armed.
    pub fn arm_count(&self) -> usize {
        self.0.lock().unwrap().arm_count
    }

    /// Most recent delay armed with.
    pub fn last_delay(&self) -> Option<Duration> {
        self.0.lock().unwrap().last_delay
    }
}

impl DeferredTimer for SimTimer {
    fn arm(&self, after: Duration) {
        let mut t = self.0.lock().unwrap();
        t.armed = Some(after);
        t.arm_count += 1;
        t.last_delay = Some(after);
    }

    fn cancel(&self) {
        self.0.lock().unwrap().armed = None;
    }
}

// ── Platform ────────────────────────────────────────────────────────────

/// Recording platform backed by one `SimUart` and an optional PCI bus.
#[derive(Debug)]
pub struct SimPlatform {
    uart: &'static SimUart,
    port_io: bool,
    pci: Option<SimPciBus>,
    timers: Mutex<Vec<(usize, TimerKind, SimTimer)>>,
    fail_irq: Mutex<bool>,
    fail_mmio: Mutex<bool>,
    fail_fence: Mutex<bool>,
    irqs: Mutex<Vec<(u32, usize)>>,
    denied: Mutex<Vec<(u16, u16)>>,
    hidden: Mutex<Vec<PciAddress>>,
    mmio_maps: Mutex<usize>,
}

impl SimPlatform {
    fn build(uart: SimUart, port_io: bool, pci: Option<SimPciBus>) -> &'static Self {
        Box::leak(Box::new(Self {
            uart: Box::leak(Box::new(uart)),
            port_io,
            pci,
            timers: Mutex::new(Vec::new()),
            fail_irq: Mutex::new(false),
            fail_mmio: Mutex::new(false),
            fail_fence: Mutex::new(false),
            irqs: Mutex::new(Vec::new()),
            denied: Mutex::new(Vec::new()),
            hidden: Mutex::new(Vec::new()),
            mmio_maps: Mutex::new(0),
        }))
    }

    /// x86-like platform: port I/O reaches `uart`, no PCI.
    pub fn with_uart(uart: SimUart) -> &'static Self {
        Self::build(uart, true, None)
    }

    /// Platform without an I/O space; every window maps onto `uart`.
    pub fn mmio_only(uart: SimUart) -> &'static Self {
        Self::build(uart, false, None)
    }

    /// Port I/O plus configuration access to `bus`.
    pub fn with_uart_and_pci(uart: SimUart, bus: SimPciBus) -> &'static Self {
        Self::build(uart, true, Some(bus))
    }

    /// The simulated chip.
    pub fn uart(&self) -> &'static SimUart {
        self.uart
    }

    /// The simulated bus.
    pub fn pci_bus(&self) -> &SimPciBus {
        self.pci.as_ref().unwrap()
    }

    /// The timer created for `index` and `kind`.
    pub fn timer(&self, index: usize, kind: TimerKind) -> SimTimer {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .find(|(i, k, _)| *i == index && *k == kind)
            .map(|(_, _, t)| t.clone())
            .unwrap()
    }

    /// Timers created so far.
    pub fn timers_created(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    /// Makes every later IRQ registration fail.
    pub fn fail_irq_registration(&self) {
        *self.fail_irq.lock().unwrap() = true;
    }

    /// Makes every later MMIO mapping fail.
    pub fn fail_mmio_mapping(&self) {
        *self.fail_mmio.lock().unwrap() = true;
    }

    /// Makes every later I/O-port revocation fail.
    pub fn fail_io_fence(&self) {
        *self.fail_fence.lock().unwrap() = true;
    }

    /// Successfully registered (irq, index) pairs.
    pub fn registered_irqs(&self) -> Vec<(u32, usize)> {
        self.irqs.lock().unwrap().clone()
    }

    /// Port ranges revoked from the control domain.
    pub fn denied_ranges(&self) -> Vec<(u16, u16)> {
        self.denied.lock().unwrap().clone()
    }

    /// Functions hidden from the control domain.
    pub fn hidden_devices(&self) -> Vec<PciAddress> {
        self.hidden.lock().unwrap().clone()
    }

    /// Memory windows mapped so far.
    pub fn mmio_maps(&self) -> usize {
        *self.mmio_maps.lock().unwrap()
    }
}

impl PlatformServices for SimPlatform {
    fn port_io(&self) -> Option<&dyn PortIo> {
        if self.port_io {
            Some(self.uart)
        } else {
            None
        }
    }

    fn pci_config(&self) -> Option<&dyn PciConfigAccess> {
        self.pci.as_ref().map(|bus| bus as &dyn PciConfigAccess)
    }

    fn map_mmio(&self, _phys_base: u64, size: u64) -> Result<Box<dyn MmioWindow>, DriverError> {
        if *self.fail_mmio.lock().unwrap() {
            return Err(DriverError::Unsupported);
        }
        *self.mmio_maps.lock().unwrap() += 1;
        Ok(Box::new(SimWindow {
            uart: self.uart,
            size,
        }))
    }

    fn create_timer(&self, index: usize, kind: TimerKind) -> Box<dyn DeferredTimer> {
        let timer = SimTimer::default();
        self.timers.lock().unwrap().push((index, kind, timer.clone()));
        Box::new(timer)
    }

    fn register_irq(&self, irq: u32, index: usize, _name: &'static str) -> Result<(), DriverError> {
        if *self.fail_irq.lock().unwrap() {
            return Err(DriverError::ResourceBusy);
        }
        self.irqs.lock().unwrap().push((irq, index));
        Ok(())
    }

    fn deny_guest_io_ports(&self, first: u16, last: u16) -> Result<(), DriverError> {
        if *self.fail_fence.lock().unwrap() {
            return Err(DriverError::Unsupported);
        }
        self.denied.lock().unwrap().push((first, last));
        Ok(())
    }

    fn hide_pci_device(&self, addr: PciAddress) {
        self.hidden.lock().unwrap().push(addr);
    }
}

// ── Console line ────────────────────────────────────────────────────────

/// Console-framework stand-in that drains receive data and counts events.
#[derive(Debug, Default)]
pub struct TestLine {
    received: RefCell<Vec<u8>>,
    rx_signals: Cell<usize>,
    tx_signals: Cell<usize>,
}

impl TestLine {
    /// Bytes drained so far.
    pub fn received(&self) -> Vec<u8> {
        self.received.borrow().clone()
    }

    /// Receive events so far.
    pub fn rx_signals(&self) -> usize {
        self.rx_signals.get()
    }

    /// Transmit-ready events so far.
    pub fn tx_signals(&self) -> usize {
        self.tx_signals.get()
    }
}

impl SerialLine for TestLine {
    fn signal_transmit_ready(&self, _uart: &dyn UartIo) {
        self.tx_signals.set(self.tx_signals.get() + 1);
    }

    fn signal_receive_data(&self, uart: &dyn UartIo) {
        self.rx_signals.set(self.rx_signals.get() + 1);
        while let Some(byte) = uart.get_byte() {
            self.received.borrow_mut().push(byte);
        }
    }
}

// ── Log capture ─────────────────────────────────────────────────────────

thread_local! {
    static LOG_LINES: RefCell<Vec<(LogLevel, String)>> = const { RefCell::new(Vec::new()) };
}

fn record_log(level: LogLevel, args: std::fmt::Arguments<'_>) {
    LOG_LINES.with_borrow_mut(|lines| lines.push((level, args.to_string())));
}

/// Runs `f` and returns what it logged on this thread.
///
/// Tests run on separate threads, so the shared sink keeps one buffer per
/// thread.
pub fn capture_log<R>(f: impl FnOnce() -> R) -> (R, Vec<(LogLevel, String)>) {
    // SAFETY: the sink only touches thread-local storage.
    unsafe { hvcon_core::log::set_log_fn(record_log) };
    LOG_LINES.with_borrow_mut(Vec::clear);
    let result = f();
    (result, LOG_LINES.take())
}

// ── Port helpers ────────────────────────────────────────────────────────

/// Resolves COM1 from `descriptor` on `platform`, unconfigured.
pub fn irq_port(platform: &'static SimPlatform, descriptor: &str) -> Ns16550 {
    resolve_port(PortIndex::Com1, &UartDefaults::com1(), descriptor, platform).unwrap()
}

/// A configured, polled COM1 at 9600 8N1.
pub fn polled_port(platform: &'static SimPlatform) -> Ns16550 {
    let mut port = irq_port(platform, "9600,8n1,0x3f8,0");
    port.init_pre_interrupt();
    port.init_post_interrupt();
    port
}
